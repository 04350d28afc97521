// src/routes/service_routes.rs

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::{
    availability::open_slots,
    error::ApiError,
    models::{AppState, Service, ServiceName},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/service", get(list_services))
        .route("/available", get(available))
}

pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceName>>, ApiError> {
    let services = state.store.list_services().await?;
    Ok(Json(services.into_iter().map(ServiceName::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub date: String,
}

/// Services with the slots still open on `date`.
pub async fn available(
    State(state): State<AppState>,
    Query(q): Query<AvailableQuery>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let services = state.store.list_services().await?;
    let bookings = state.store.bookings_on(&q.date).await?;

    Ok(Json(open_slots(services, &bookings)))
}
