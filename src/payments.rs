//! Payment-intent provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment provider rejected request ({status}): {message}")]
    Provider { status: u16, message: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a card-only USD intent for `amount` minor units and return its
    /// client secret.
    async fn create_intent(&self, amount: i64) -> Result<String, PaymentError>;
}

/// Largest intent amount the provider accepts, in minor units.
pub const MAX_INTENT_AMOUNT: i64 = 99_999_999;

/// Price in major units to minor units. `None` unless the result is a
/// positive amount the provider can charge.
pub fn to_minor_units(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    let amount = (price * 100.0).round();
    if amount < 1.0 || amount > MAX_INTENT_AMOUNT as f64 {
        return None;
    }
    Some(amount as i64)
}

pub struct StripeGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, amount: i64) -> Result<String, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        tracing::debug!(amount, "creating payment intent");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.to_string()),
                ("currency", "usd".to_string()),
                ("payment_method_types[]", "card".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(text);
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: IntentBody = response.json().await?;
        Ok(body.client_secret)
    }
}
