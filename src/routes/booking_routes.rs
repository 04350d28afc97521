// src/routes/booking_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::BookingInsert,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        AppState, Booking, CreateBookingResponse, NewBooking, Payment, PaymentConfirmation,
        UpdateResult,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/booking", get(list_patient_bookings).post(create_booking))
        .route("/booking/{id}", get(get_booking).patch(confirm_payment))
}

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub patient: Option<String>,
}

/// A caller may only list their own bookings.
pub async fn list_patient_bookings(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<PatientQuery>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let Some(patient) = q.patient.filter(|p| *p == auth.email) else {
        tracing::warn!(email = %auth.email, "booking list for another patient denied");
        return Err(ApiError::invalid_credentials());
    };

    Ok(Json(state.store.bookings_for_patient(&patient).await?))
}

/// Any authenticated caller may read a booking by id (payment page).
pub async fn get_booking(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    state
        .store
        .find_booking(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Booking not found".into()))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<NewBooking>,
) -> Result<Json<CreateBookingResponse>, ApiError> {
    let service = state
        .store
        .find_service(&req.treatment)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("unknown treatment: {}", req.treatment),
            )
        })?;

    if !service.slots.contains(&req.slot) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("slot {} is not offered for {}", req.slot, service.name),
        ));
    }

    let response = match state.store.insert_booking(Booking::from_request(req)).await? {
        BookingInsert::Created(result) => {
            tracing::info!(booking_id = %result.inserted_id, "booking created");
            CreateBookingResponse::Created {
                success: true,
                result,
            }
        }
        BookingInsert::Exists(booking) => {
            tracing::info!(booking_id = %booking.id, "duplicate booking request");
            CreateBookingResponse::Exists {
                success: false,
                booking,
            }
        }
    };

    Ok(Json(response))
}

/// Mark the booking paid and log the payment.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentConfirmation>,
) -> Result<Json<UpdateResult>, ApiError> {
    if req.transaction_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "transactionId is required".into(),
        ));
    }

    let payment = Payment::for_booking(id, req);
    let transaction_id = payment.transaction_id.clone();

    let result = state
        .store
        .record_payment(id, payment)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Booking not found".into()))?;

    tracing::info!(booking_id = %id, %transaction_id, "payment recorded");
    Ok(Json(result))
}
