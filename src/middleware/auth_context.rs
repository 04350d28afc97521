use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::typed_header::TypedHeaderRejectionReason;
use headers::{Authorization, authorization::Bearer};

use crate::error::ApiError;
use crate::models::AppState;

/// Caller identity taken from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub email: String,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Absent header is 401; anything present but unusable is 403.
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|rejection| {
                        if matches!(rejection.reason(), TypedHeaderRejectionReason::Missing) {
                            ApiError::missing_credentials()
                        } else {
                            ApiError::invalid_credentials()
                        }
                    })?;

            let claims = state.tokens.verify(authz.token()).map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                ApiError::invalid_credentials()
            })?;

            Ok(AuthContext { email: claims.email })
        }
    }
}

/// An authenticated caller whose user record carries the admin role.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub email: String,
}

impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let auth = AuthContext::from_request_parts(parts, state).await?;

            // No user record means not an admin.
            let requester = state.store.find_user(&auth.email).await?;
            if requester.as_ref().is_some_and(|u| u.is_admin()) {
                Ok(AdminContext { email: auth.email })
            } else {
                tracing::warn!(email = %auth.email, "admin route denied");
                Err(ApiError::not_admin())
            }
        }
    }
}
