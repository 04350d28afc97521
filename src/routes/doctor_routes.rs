// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};

use crate::{
    error::ApiError,
    middleware::auth_context::AdminContext,
    models::{AppState, DeleteResult, Doctor, InsertOneResult, NewDoctor},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctor", get(list_doctors).post(add_doctor))
        .route("/doctor/{email}", delete(remove_doctor))
}

pub async fn list_doctors(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    Ok(Json(state.store.list_doctors().await?))
}

// No duplicate-email check: the same doctor may be added twice.
pub async fn add_doctor(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(req): Json<NewDoctor>,
) -> Result<Json<InsertOneResult>, ApiError> {
    let doctor = Doctor::from_request(req);
    let email = doctor.email.clone();
    let result = state.store.insert_doctor(doctor).await?;

    tracing::info!(added_by = %admin.email, doctor = %email, "doctor added");
    Ok(Json(result))
}

pub async fn remove_doctor(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(email): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    let result = state.store.delete_doctor(&email).await?;

    tracing::info!(
        removed_by = %admin.email,
        doctor = %email,
        deleted = result.deleted_count,
        "doctor removed"
    );
    Ok(Json(result))
}
