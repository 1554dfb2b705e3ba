use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A booked visit with either a doctor or a lab.
///
/// Patient and provider details are denormalized at booking time so the
/// appointment record survives later profile edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doc_id: Option<Uuid>,
    pub lab_id: Option<Uuid>,
    /// Calendar date in `%Y-%m-%d`.
    pub slot_date: String,
    /// Display time string, e.g. `10:30 AM`.
    pub slot_time: String,
    /// Fee in whole currency units, captured from the provider.
    pub amount: i64,
    pub user_snapshot: serde_json::Value,
    pub provider_snapshot: serde_json::Value,
    pub cancelled: bool,
    pub is_completed: bool,
    pub payment: bool,
    pub prescription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn for_doctor(
        user_id: Uuid,
        doc_id: Uuid,
        slot_date: String,
        slot_time: String,
        amount: i64,
        user_snapshot: serde_json::Value,
        doctor_snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            doc_id: Some(doc_id),
            lab_id: None,
            slot_date,
            slot_time,
            amount,
            user_snapshot,
            provider_snapshot: doctor_snapshot,
            cancelled: false,
            is_completed: false,
            payment: false,
            prescription_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_lab(
        user_id: Uuid,
        lab_id: Uuid,
        slot_date: String,
        slot_time: String,
        amount: i64,
        user_snapshot: serde_json::Value,
        lab_snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            doc_id: None,
            lab_id: Some(lab_id),
            slot_date,
            slot_time,
            amount,
            user_snapshot,
            provider_snapshot: lab_snapshot,
            cancelled: false,
            is_completed: false,
            payment: false,
            prescription_id: None,
            created_at: Utc::now(),
        }
    }
}
