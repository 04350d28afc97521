use crate::models::AppState;
use axum::Router;

pub mod booking_routes;
pub mod doctor_routes;
pub mod home_routes;
pub mod payment_routes;
pub mod service_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(service_routes::router())
        .merge(user_routes::router())
        .merge(booking_routes::router())
        .merge(payment_routes::router())
        .merge(doctor_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
