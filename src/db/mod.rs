//! Document storage behind the API.
//!
//! Every collection is a set of JSON documents; lookups by key return
//! `Option` and the write methods return document-store style
//! acknowledgements.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{
    Booking, DeleteResult, Doctor, InsertOneResult, Payment, Service, UpdateResult, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, connect_pg};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("document encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Outcome of a deduplicated booking insert.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingInsert {
    Created(InsertOneResult),
    /// A booking with the same (treatment, date, patient) was already stored.
    Exists(Booking),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;

    async fn find_service(&self, name: &str) -> Result<Option<Service>, StoreError>;

    async fn bookings_on(&self, date: &str) -> Result<Vec<Booking>, StoreError>;

    async fn bookings_for_patient(&self, patient: &str) -> Result<Vec<Booking>, StoreError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Insert unless a booking for the same (treatment, date, patient)
    /// exists. The check and the insert are one atomic step.
    async fn insert_booking(&self, booking: Booking) -> Result<BookingInsert, StoreError>;

    /// Mark the booking paid and append `payment` to the payment log as one
    /// unit. `None` if the booking does not exist; nothing is written then.
    async fn record_payment(
        &self,
        booking_id: Uuid,
        payment: Payment,
    ) -> Result<Option<UpdateResult>, StoreError>;

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Insert-or-merge the profile fields of the user keyed by `email`.
    async fn upsert_user(
        &self,
        email: &str,
        profile: &Map<String, Value>,
    ) -> Result<UpdateResult, StoreError>;

    /// Set the role of an existing user. Unknown emails match nothing.
    async fn set_role(&self, email: &str, role: &str) -> Result<UpdateResult, StoreError>;

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;

    async fn insert_doctor(&self, doctor: Doctor) -> Result<InsertOneResult, StoreError>;

    /// Delete at most one doctor with this email.
    async fn delete_doctor(&self, email: &str) -> Result<DeleteResult, StoreError>;

    async fn close(&self) {}
}
