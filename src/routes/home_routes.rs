use axum::{Router, routing::get};

use crate::models::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(liveness))
}

pub async fn liveness() -> &'static str {
    "Server Is Running"
}
