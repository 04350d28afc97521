// src/routes/user_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde_json::{Map, Value};

use crate::{
    error::ApiError,
    middleware::auth_context::{AdminContext, AuthContext},
    models::{ADMIN_ROLE, AdminStatus, AppState, UpdateResult, User, UserUpsertResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/{email}", get(admin_status))
        .route("/user/admin/{email}", put(grant_admin))
        .route("/user/{email}", put(upsert_user))
        .route("/users", get(list_users))
}

pub async fn admin_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AdminStatus>, ApiError> {
    let user = state.store.find_user(&email).await?;
    Ok(Json(AdminStatus {
        admin: user.is_some_and(|u| u.is_admin()),
    }))
}

pub async fn grant_admin(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(email): Path<String>,
) -> Result<Json<UpdateResult>, ApiError> {
    let result = state.store.set_role(&email, ADMIN_ROLE).await?;
    tracing::info!(
        granted_by = %admin.email,
        target = %email,
        matched = result.matched_count,
        "admin role granted"
    );
    Ok(Json(result))
}

/// Save the caller's profile and hand back a fresh access token. This is
/// the only place tokens are issued.
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(profile): Json<Map<String, Value>>,
) -> Result<Json<UserUpsertResponse>, ApiError> {
    let email = email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email is required".into(),
        ));
    }

    let result = state.store.upsert_user(&email, &profile).await?;

    let access_token = state
        .tokens
        .issue(&email)
        .map_err(|e| ApiError::Internal(format!("token error: {e}")))?;

    if result.upserted_id.is_some() {
        tracing::info!(%email, "user created");
    }

    Ok(Json(UserUpsertResponse {
        result,
        access_token,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.store.list_users().await?))
}
