use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{auth::TokenKeys, db::Store, payments::PaymentGateway};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub payments: Arc<dyn PaymentGateway>,
    pub tokens: Arc<TokenKeys>,
}

/* -------------------------
   Documents
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Public catalog projection: name only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceName {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

impl From<Service> for ServiceName {
    fn from(s: Service) -> Self {
        Self { id: s.id, name: s.name }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub treatment: String,
    pub date: String,
    pub patient: String,
    pub slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    #[serde(rename = "transactionId", default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Booking {
    pub fn from_request(req: NewBooking) -> Self {
        let mut extra = req.extra;
        for key in ["_id", "paid", "transactionId"] {
            extra.remove(key);
        }
        Self {
            id: Uuid::new_v4(),
            treatment: req.treatment,
            date: req.date,
            patient: req.patient,
            slot: req.slot,
            paid: None,
            transaction_id: None,
            extra,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.paid.unwrap_or(false)
    }

    /// Returns `true` if anything changed.
    pub fn mark_paid(&mut self, transaction_id: &str) -> bool {
        let changed =
            !self.is_paid() || self.transaction_id.as_deref() != Some(transaction_id);
        self.paid = Some(true);
        self.transaction_id = Some(transaction_id.to_string());
        changed
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub treatment: String,
    pub date: String,
    pub patient: String,
    pub slot: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: None,
            profile: Map::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// `$set`-style partial update. Identity and role keys are never taken
    /// from a profile payload. Returns `true` if anything changed.
    pub fn apply_profile(&mut self, profile: &Map<String, Value>) -> bool {
        let mut changed = false;
        for (key, value) in profile {
            if matches!(key.as_str(), "_id" | "email" | "role") {
                continue;
            }
            if self.profile.get(key) != Some(value) {
                self.profile.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Returns `true` if the role changed.
    pub fn set_role(&mut self, role: &str) -> bool {
        if self.role.as_deref() == Some(role) {
            return false;
        }
        self.role = Some(role.to_string());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Doctor {
    pub fn from_request(req: NewDoctor) -> Self {
        let mut extra = req.extra;
        extra.remove("_id");
        Self {
            id: Uuid::new_v4(),
            name: req.name,
            email: req.email,
            specialty: req.specialty,
            extra,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub booking: Uuid,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    #[serde(rename = "paidAt")]
    pub paid_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Payment {
    pub fn for_booking(booking: Uuid, req: PaymentConfirmation) -> Self {
        let mut extra = req.extra;
        for key in ["_id", "booking", "paidAt"] {
            extra.remove(key);
        }
        Self {
            id: Uuid::new_v4(),
            booking,
            transaction_id: req.transaction_id,
            paid_at: Utc::now(),
            extra,
        }
    }
}

/// Body of `PATCH /booking/{id}`: the provider transaction plus whatever
/// card metadata the client reports.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/* -------------------------
   Write acknowledgements
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

impl InsertOneResult {
    pub fn new(inserted_id: Uuid) -> Self {
        Self { acknowledged: true, inserted_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Uuid>,
    pub upserted_count: u64,
}

impl UpdateResult {
    pub fn unmatched() -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_id: None,
            upserted_count: 0,
        }
    }

    pub fn matched(modified: bool) -> Self {
        Self {
            matched_count: 1,
            modified_count: u64::from(modified),
            ..Self::unmatched()
        }
    }

    pub fn upserted(id: Uuid) -> Self {
        Self {
            upserted_id: Some(id),
            upserted_count: 1,
            ..Self::unmatched()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self { acknowledged: true, deleted_count }
    }
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreateBookingResponse {
    Created { success: bool, result: InsertOneResult },
    Exists { success: bool, booking: Booking },
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub admin: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpsertResponse {
    pub result: UpdateResult,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn apply_profile_merges_and_ignores_identity_keys() {
        let mut user = User::new("a@x.com");
        user.profile.insert("name".into(), json!("Old"));

        let changed = user.apply_profile(&map(json!({
            "name": "New",
            "phone": "555",
            "role": "admin",
            "email": "evil@x.com"
        })));

        assert!(changed);
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, None);
        assert_eq!(user.profile["name"], json!("New"));
        assert_eq!(user.profile["phone"], json!("555"));
        assert!(!user.profile.contains_key("role"));

        assert!(!user.apply_profile(&map(json!({ "name": "New" }))));
    }

    #[test]
    fn user_serializes_profile_inline() {
        let mut user = User::new("a@x.com");
        user.apply_profile(&map(json!({ "name": "Ann" })));
        user.set_role(ADMIN_ROLE);

        let v = serde_json::to_value(&user).unwrap();
        assert_eq!(v["email"], "a@x.com");
        assert_eq!(v["name"], "Ann");
        assert_eq!(v["role"], "admin");

        let back: User = serde_json::from_value(v).unwrap();
        assert_eq!(back, user);
        assert!(back.is_admin());
    }

    #[test]
    fn new_booking_drops_reserved_keys() {
        let req: NewBooking = serde_json::from_value(json!({
            "treatment": "Cleaning",
            "date": "2024-01-01",
            "patient": "a@x.com",
            "slot": "9AM",
            "paid": true,
            "transactionId": "forged",
            "patientName": "Ann"
        }))
        .unwrap();

        let booking = Booking::from_request(req);
        assert!(!booking.is_paid());
        assert_eq!(booking.transaction_id, None);
        assert_eq!(booking.extra.get("patientName"), Some(&json!("Ann")));

        let v = serde_json::to_value(&booking).unwrap();
        assert!(v.get("paid").is_none());
    }

    #[test]
    fn mark_paid_reports_change_once() {
        let mut booking = Booking::from_request(NewBooking {
            treatment: "Cleaning".into(),
            date: "2024-01-01".into(),
            patient: "a@x.com".into(),
            slot: "9AM".into(),
            extra: Map::new(),
        });
        assert!(booking.mark_paid("tx1"));
        assert!(!booking.mark_paid("tx1"));
        assert!(booking.mark_paid("tx2"));
        assert_eq!(booking.transaction_id.as_deref(), Some("tx2"));
    }

    #[test]
    fn update_result_uses_camel_case() {
        let v = serde_json::to_value(UpdateResult::matched(true)).unwrap();
        assert_eq!(v["matchedCount"], 1);
        assert_eq!(v["modifiedCount"], 1);
        assert_eq!(v["upsertedId"], Value::Null);
    }
}
