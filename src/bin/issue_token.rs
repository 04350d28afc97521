use anyhow::Context;
use chrono::TimeDelta;
use clinic_booking::{
    auth::TokenKeys,
    config::{DEFAULT_TOKEN_TTL_MINUTES, parse_token_ttl},
};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let email = std::env::args()
        .nth(1)
        .context("Usage: issue-token <email> [ttl-minutes]")?;
    let ttl = match std::env::args().nth(2) {
        Some(s) => parse_token_ttl(&s)?,
        None => TimeDelta::minutes(DEFAULT_TOKEN_TTL_MINUTES),
    };
    let secret =
        std::env::var("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET must be set")?;

    let token = TokenKeys::new(&secret, ttl).issue(&email)?;
    println!("{token}");
    Ok(())
}
