use std::env;

use anyhow::{Context, bail};
use chrono::TimeDelta;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// One year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string. `None` runs the server on the memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub access_token_secret: String,
    pub access_token_ttl: TimeDelta,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(5000);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{port}"));

        let access_token_secret =
            env::var("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET must be set")?;
        let access_token_ttl = match env::var("ACCESS_TOKEN_TTL_MINUTES") {
            Ok(s) => parse_token_ttl(&s).context("invalid ACCESS_TOKEN_TTL_MINUTES")?,
            Err(_) => TimeDelta::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        };

        let stripe_secret_key =
            env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?;
        let stripe_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string());

        Ok(Self {
            database_url,
            bind_addr,
            access_token_secret,
            access_token_ttl,
            stripe_secret_key,
            stripe_api_base,
        })
    }
}

/// Token lifetime in whole minutes, between one minute and one year.
pub fn parse_token_ttl(minutes: &str) -> anyhow::Result<TimeDelta> {
    let minutes: i64 = minutes
        .trim()
        .parse()
        .context("token lifetime must be a whole number of minutes")?;
    if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
        bail!("token lifetime must be between 1 and {MAX_TOKEN_TTL_MINUTES} minutes, got {minutes}");
    }
    TimeDelta::try_minutes(minutes).context("token lifetime out of range")
}
