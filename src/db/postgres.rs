use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use uuid::Uuid;

use super::{BookingInsert, Store, StoreError};
use crate::models::{
    Booking, DeleteResult, Doctor, InsertOneResult, Payment, Service, UpdateResult, User,
};

pub async fn connect_pg(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Postgres-backed store. Each collection is a `(id, doc jsonb)` table.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(connect_pg(database_url).await?))
    }
}

fn unwrap_docs<T>(rows: Vec<Json<T>>) -> Vec<T> {
    rows.into_iter().map(|Json(doc)| doc).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let rows: Vec<Json<Service>> = sqlx::query_scalar(
            r#"
            SELECT doc
            FROM services
            ORDER BY doc->>'name' ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(unwrap_docs(rows))
    }

    async fn find_service(&self, name: &str) -> Result<Option<Service>, StoreError> {
        let row: Option<Json<Service>> = sqlx::query_scalar(
            r#"
            SELECT doc
            FROM services
            WHERE doc->>'name' = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(s)| s))
    }

    async fn bookings_on(&self, date: &str) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<Json<Booking>> = sqlx::query_scalar(
            r#"
            SELECT doc
            FROM bookings
            WHERE doc->>'date' = $1
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(unwrap_docs(rows))
    }

    async fn bookings_for_patient(&self, patient: &str) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<Json<Booking>> = sqlx::query_scalar(
            r#"
            SELECT doc
            FROM bookings
            WHERE doc->>'patient' = $1
            "#,
        )
        .bind(patient)
        .fetch_all(&self.pool)
        .await?;

        Ok(unwrap_docs(rows))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row: Option<Json<Booking>> =
            sqlx::query_scalar("SELECT doc FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|Json(b)| b))
    }

    async fn insert_booking(&self, booking: Booking) -> Result<BookingInsert, StoreError> {
        // The unique index on (treatment, date, patient) makes this a single
        // atomic check-and-insert.
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (id, doc)
            VALUES ($1, $2)
            ON CONFLICT ((doc->>'treatment'), (doc->>'date'), (doc->>'patient')) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(booking.id)
        .bind(Json(&booking))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(BookingInsert::Created(InsertOneResult::new(id)));
        }

        let Json(existing): Json<Booking> = sqlx::query_scalar(
            r#"
            SELECT doc
            FROM bookings
            WHERE doc->>'treatment' = $1
              AND doc->>'date' = $2
              AND doc->>'patient' = $3
            "#,
        )
        .bind(&booking.treatment)
        .bind(&booking.date)
        .bind(&booking.patient)
        .fetch_one(&self.pool)
        .await?;

        Ok(BookingInsert::Exists(existing))
    }

    async fn record_payment(
        &self,
        booking_id: Uuid,
        payment: Payment,
    ) -> Result<Option<UpdateResult>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Json<Booking>> =
            sqlx::query_scalar("SELECT doc FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(booking_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(Json(mut booking)) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let modified = booking.mark_paid(&payment.transaction_id);
        if modified {
            sqlx::query("UPDATE bookings SET doc = $2 WHERE id = $1")
                .bind(booking_id)
                .bind(Json(&booking))
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT INTO payments (id, doc) VALUES ($1, $2)")
            .bind(payment.id)
            .bind(Json(&payment))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(UpdateResult::matched(modified)))
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<Json<User>> =
            sqlx::query_scalar("SELECT doc FROM users WHERE doc->>'email' = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|Json(u)| u))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<Json<User>> = sqlx::query_scalar("SELECT doc FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(unwrap_docs(rows))
    }

    async fn upsert_user(
        &self,
        email: &str,
        profile: &Map<String, Value>,
    ) -> Result<UpdateResult, StoreError> {
        // Insert first: the unique email index settles concurrent first-time
        // upserts, and the losers fall through to the merge below.
        let mut fresh = User::new(email);
        fresh.apply_profile(profile);

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, doc)
            VALUES ($1, $2)
            ON CONFLICT ((doc->>'email')) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(fresh.id)
        .bind(Json(&fresh))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(UpdateResult::upserted(id));
        }

        let mut tx = self.pool.begin().await?;

        let Json(mut user): Json<User> =
            sqlx::query_scalar("SELECT doc FROM users WHERE doc->>'email' = $1 FOR UPDATE")
                .bind(email)
                .fetch_one(&mut *tx)
                .await?;

        let modified = user.apply_profile(profile);
        if modified {
            sqlx::query("UPDATE users SET doc = $2 WHERE id = $1")
                .bind(user.id)
                .bind(Json(&user))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(UpdateResult::matched(modified))
    }

    async fn set_role(&self, email: &str, role: &str) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Json<User>> =
            sqlx::query_scalar("SELECT doc FROM users WHERE doc->>'email' = $1 FOR UPDATE")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(Json(mut user)) = current else {
            tx.rollback().await?;
            return Ok(UpdateResult::unmatched());
        };

        let modified = user.set_role(role);
        if modified {
            sqlx::query("UPDATE users SET doc = $2 WHERE id = $1")
                .bind(user.id)
                .bind(Json(&user))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(UpdateResult::matched(modified))
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let rows: Vec<Json<Doctor>> = sqlx::query_scalar("SELECT doc FROM doctors")
            .fetch_all(&self.pool)
            .await?;

        Ok(unwrap_docs(rows))
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<InsertOneResult, StoreError> {
        sqlx::query("INSERT INTO doctors (id, doc) VALUES ($1, $2)")
            .bind(doctor.id)
            .bind(Json(&doctor))
            .execute(&self.pool)
            .await?;

        Ok(InsertOneResult::new(doctor.id))
    }

    async fn delete_doctor(&self, email: &str) -> Result<DeleteResult, StoreError> {
        let done = sqlx::query(
            r#"
            DELETE FROM doctors
            WHERE id = (
                SELECT id
                FROM doctors
                WHERE doc->>'email' = $1
                LIMIT 1
            )
            "#,
        )
        .bind(email)
        .execute(&self.pool)
        .await?;

        Ok(DeleteResult::new(done.rows_affected()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBooking, PaymentConfirmation};
    use serde_json::json;

    fn booking(patient: &str, slot: &str) -> Booking {
        Booking::from_request(NewBooking {
            treatment: "Teeth Cleaning".into(),
            date: "2024-01-01".into(),
            patient: patient.into(),
            slot: slot.into(),
            extra: Map::new(),
        })
    }

    fn profile(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn seeds_full_catalog(pool: PgPool) {
        let store = PgStore::new(pool);

        let names: Vec<String> = store
            .list_services()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "Cavity Protection",
                "Cosmetic Dentistry",
                "Teeth Cleaning",
                "Teeth Orthodontics",
            ]
        );

        let cleaning = store.find_service("Teeth Cleaning").await.unwrap().unwrap();
        assert_eq!(cleaning.slots.len(), 7);
        assert_eq!(cleaning.price, Some(60.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_booking_returns_existing(pool: PgPool) {
        let store = PgStore::new(pool);
        let first = booking("a@x.com", "08.00 AM - 08.30 AM");
        let first_id = first.id;

        let created = store.insert_booking(first).await.unwrap();
        assert_eq!(created, BookingInsert::Created(InsertOneResult::new(first_id)));

        match store
            .insert_booking(booking("a@x.com", "09.00 AM - 09.30 AM"))
            .await
            .unwrap()
        {
            BookingInsert::Exists(b) => {
                assert_eq!(b.id, first_id);
                assert_eq!(b.slot, "08.00 AM - 08.30 AM");
            }
            other => panic!("expected Exists, got {other:?}"),
        }

        assert_eq!(store.bookings_on("2024-01-01").await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn record_payment_marks_paid_or_writes_nothing(pool: PgPool) {
        let store = PgStore::new(pool.clone());

        let missing = Uuid::new_v4();
        let payment = Payment::for_booking(
            missing,
            PaymentConfirmation { transaction_id: "tx0".into(), extra: Map::new() },
        );
        assert_eq!(store.record_payment(missing, payment).await.unwrap(), None);

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM payments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        let b = booking("a@x.com", "08.00 AM - 08.30 AM");
        let id = b.id;
        store.insert_booking(b).await.unwrap();
        let payment = Payment::for_booking(
            id,
            PaymentConfirmation { transaction_id: "tx123".into(), extra: Map::new() },
        );
        let result = store.record_payment(id, payment).await.unwrap().unwrap();
        assert_eq!((result.matched_count, result.modified_count), (1, 1));

        let stored = store.find_booking(id).await.unwrap().unwrap();
        assert!(stored.is_paid());
        assert_eq!(stored.transaction_id.as_deref(), Some("tx123"));

        let logged: Vec<Json<Payment>> = sqlx::query_scalar("SELECT doc FROM payments")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].0.transaction_id, "tx123");
        assert_eq!(logged[0].0.booking, id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn upsert_merges_profile(pool: PgPool) {
        let store = PgStore::new(pool);

        let first = store
            .upsert_user("a@x.com", &profile(json!({ "name": "Ann", "phone": "555" })))
            .await
            .unwrap();
        assert_eq!(first.upserted_count, 1);

        let second = store
            .upsert_user("a@x.com", &profile(json!({ "phone": "777", "role": "admin" })))
            .await
            .unwrap();
        assert_eq!((second.matched_count, second.modified_count), (1, 1));

        let unchanged = store
            .upsert_user("a@x.com", &profile(json!({ "phone": "777" })))
            .await
            .unwrap();
        assert_eq!((unchanged.matched_count, unchanged.modified_count), (1, 0));

        let user = store.find_user("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.profile["name"], "Ann");
        assert_eq!(user.profile["phone"], "777");
        assert_eq!(user.role, None);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_first_upserts_all_succeed(pool: PgPool) {
        let store = PgStore::new(pool);

        for i in 0..20 {
            let email = format!("user{i}@x.com");
            let a = profile(json!({ "name": "A" }));
            let b = profile(json!({ "phone": "555" }));

            let (ra, rb) = tokio::join!(
                store.upsert_user(&email, &a),
                store.upsert_user(&email, &b),
            );
            let (ra, rb) = (ra.unwrap(), rb.unwrap());
            assert_eq!(ra.upserted_count + rb.upserted_count, 1);

            let user = store.find_user(&email).await.unwrap().unwrap();
            assert_eq!(user.profile["name"], "A");
            assert_eq!(user.profile["phone"], "555");
        }

        assert_eq!(store.list_users().await.unwrap().len(), 20);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn set_role_only_touches_existing_users(pool: PgPool) {
        let store = PgStore::new(pool);
        store.upsert_user("a@x.com", &Map::new()).await.unwrap();

        let missing = store.set_role("nobody@x.com", "admin").await.unwrap();
        assert_eq!(missing.matched_count, 0);
        assert!(store.find_user("nobody@x.com").await.unwrap().is_none());

        let granted = store.set_role("a@x.com", "admin").await.unwrap();
        assert_eq!((granted.matched_count, granted.modified_count), (1, 1));
        let again = store.set_role("a@x.com", "admin").await.unwrap();
        assert_eq!((again.matched_count, again.modified_count), (1, 0));

        assert!(store.find_user("a@x.com").await.unwrap().unwrap().is_admin());
    }
}
