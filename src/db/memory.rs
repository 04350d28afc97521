use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookingInsert, Store, StoreError};
use crate::models::{
    Booking, DeleteResult, Doctor, InsertOneResult, Payment, Service, UpdateResult, User,
};

#[derive(Default)]
struct Collections {
    services: Vec<Service>,
    bookings: Vec<Booking>,
    users: Vec<User>,
    doctors: Vec<Doctor>,
    payments: Vec<Payment>,
}

/// In-process store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(services: Vec<Service>) -> Self {
        Self {
            inner: RwLock::new(Collections {
                services,
                ..Collections::default()
            }),
        }
    }

    /// Catalog used when the server runs without a database.
    pub fn with_default_catalog() -> Self {
        let slots = |labels: &[&str]| labels.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let day = [
            "08.00 AM - 08.30 AM",
            "08.30 AM - 09.00 AM",
            "09.00 AM - 09.30 AM",
            "09.30 AM - 10.00 AM",
            "10.00 AM - 10.30 AM",
            "10.30 AM - 11.00 AM",
            "11.00 AM - 11.30 AM",
        ];
        let services = [
            ("Teeth Orthodontics", 120.0),
            ("Cosmetic Dentistry", 150.0),
            ("Teeth Cleaning", 60.0),
            ("Cavity Protection", 80.0),
        ]
        .into_iter()
        .map(|(name, price)| Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slots: slots(&day[..]),
            price: Some(price),
        })
        .collect();
        Self::with_services(services)
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.inner.read().await.payments.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        Ok(self.inner.read().await.services.clone())
    }

    async fn find_service(&self, name: &str) -> Result<Option<Service>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.services.iter().find(|s| s.name == name).cloned())
    }

    async fn bookings_on(&self, date: &str) -> Result<Vec<Booking>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.bookings.iter().filter(|b| b.date == date).cloned().collect())
    }

    async fn bookings_for_patient(&self, patient: &str) -> Result<Vec<Booking>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.bookings.iter().filter(|b| b.patient == patient).cloned().collect())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn insert_booking(&self, booking: Booking) -> Result<BookingInsert, StoreError> {
        let mut c = self.inner.write().await;
        if let Some(existing) = c.bookings.iter().find(|b| {
            b.treatment == booking.treatment && b.date == booking.date && b.patient == booking.patient
        }) {
            return Ok(BookingInsert::Exists(existing.clone()));
        }
        let id = booking.id;
        c.bookings.push(booking);
        Ok(BookingInsert::Created(InsertOneResult::new(id)))
    }

    async fn record_payment(
        &self,
        booking_id: Uuid,
        payment: Payment,
    ) -> Result<Option<UpdateResult>, StoreError> {
        let mut c = self.inner.write().await;
        let Some(booking) = c.bookings.iter_mut().find(|b| b.id == booking_id) else {
            return Ok(None);
        };
        let modified = booking.mark_paid(&payment.transaction_id);
        c.payments.push(payment);
        Ok(Some(UpdateResult::matched(modified)))
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn upsert_user(
        &self,
        email: &str,
        profile: &Map<String, Value>,
    ) -> Result<UpdateResult, StoreError> {
        let mut c = self.inner.write().await;
        if let Some(user) = c.users.iter_mut().find(|u| u.email == email) {
            let modified = user.apply_profile(profile);
            return Ok(UpdateResult::matched(modified));
        }
        let mut user = User::new(email);
        user.apply_profile(profile);
        let id = user.id;
        c.users.push(user);
        Ok(UpdateResult::upserted(id))
    }

    async fn set_role(&self, email: &str, role: &str) -> Result<UpdateResult, StoreError> {
        let mut c = self.inner.write().await;
        match c.users.iter_mut().find(|u| u.email == email) {
            Some(user) => Ok(UpdateResult::matched(user.set_role(role))),
            None => Ok(UpdateResult::unmatched()),
        }
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        Ok(self.inner.read().await.doctors.clone())
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<InsertOneResult, StoreError> {
        let id = doctor.id;
        self.inner.write().await.doctors.push(doctor);
        Ok(InsertOneResult::new(id))
    }

    async fn delete_doctor(&self, email: &str) -> Result<DeleteResult, StoreError> {
        let mut c = self.inner.write().await;
        match c.doctors.iter().position(|d| d.email == email) {
            Some(idx) => {
                c.doctors.remove(idx);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBooking, NewDoctor, PaymentConfirmation};
    use serde_json::json;

    fn booking(treatment: &str, date: &str, patient: &str, slot: &str) -> Booking {
        Booking::from_request(NewBooking {
            treatment: treatment.into(),
            date: date.into(),
            patient: patient.into(),
            slot: slot.into(),
            extra: Map::new(),
        })
    }

    #[tokio::test]
    async fn duplicate_booking_returns_existing_record() {
        let store = MemoryStore::new();
        let first = booking("Cleaning", "2024-01-01", "a@x.com", "9AM");
        let first_id = first.id;

        let created = store.insert_booking(first).await.unwrap();
        assert_eq!(created, BookingInsert::Created(InsertOneResult::new(first_id)));

        // Different slot, same triple.
        let again = store
            .insert_booking(booking("Cleaning", "2024-01-01", "a@x.com", "10AM"))
            .await
            .unwrap();
        match again {
            BookingInsert::Exists(b) => {
                assert_eq!(b.id, first_id);
                assert_eq!(b.slot, "9AM");
            }
            other => panic!("expected Exists, got {other:?}"),
        }
        assert_eq!(store.bookings_for_patient("a@x.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_payment_on_missing_booking_writes_nothing() {
        let store = MemoryStore::new();
        let payment = Payment::for_booking(
            Uuid::new_v4(),
            PaymentConfirmation { transaction_id: "tx".into(), extra: Map::new() },
        );
        let id = payment.booking;

        assert_eq!(store.record_payment(id, payment).await.unwrap(), None);
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn upsert_then_set_role() {
        let store = MemoryStore::new();
        let profile = json!({ "name": "Ann" }).as_object().cloned().unwrap();

        let first = store.upsert_user("a@x.com", &profile).await.unwrap();
        assert_eq!(first.upserted_count, 1);
        let second = store.upsert_user("a@x.com", &profile).await.unwrap();
        assert_eq!((second.matched_count, second.modified_count), (1, 0));

        assert_eq!(store.set_role("nobody@x.com", "admin").await.unwrap().matched_count, 0);
        assert_eq!(store.set_role("a@x.com", "admin").await.unwrap().modified_count, 1);
        assert!(store.find_user("a@x.com").await.unwrap().unwrap().is_admin());
    }

    #[tokio::test]
    async fn delete_doctor_removes_one_match() {
        let store = MemoryStore::new();
        for name in ["Dr A", "Dr B"] {
            let doctor = Doctor::from_request(NewDoctor {
                name: name.into(),
                email: "same@x.com".into(),
                specialty: None,
                extra: Map::new(),
            });
            store.insert_doctor(doctor).await.unwrap();
        }

        assert_eq!(store.delete_doctor("same@x.com").await.unwrap().deleted_count, 1);
        assert_eq!(store.list_doctors().await.unwrap().len(), 1);
        assert_eq!(store.delete_doctor("other@x.com").await.unwrap().deleted_count, 0);
    }
}
