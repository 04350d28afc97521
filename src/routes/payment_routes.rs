// src/routes/payment_routes.rs

use axum::{Json, Router, extract::State, routing::post};

use crate::{
    error::ApiError,
    models::{AppState, PaymentIntentRequest, PaymentIntentResponse},
    payments::{MAX_INTENT_AMOUNT, to_minor_units},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/create-payment-intent", post(create_payment_intent))
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(req): Json<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let amount = to_minor_units(req.price).ok_or_else(|| {
        ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!(
                "price must be between 0.01 and {:.2}",
                MAX_INTENT_AMOUNT as f64 / 100.0
            ),
        )
    })?;

    let client_secret = state.payments.create_intent(amount).await?;

    Ok(Json(PaymentIntentResponse { client_secret }))
}
