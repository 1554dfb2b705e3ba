use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uploaded prescription document, one-to-one with an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub user_id: Uuid,
    pub doc_id: Uuid,
    /// Path under the uploads directory, e.g. `/uploads/prescriptions/...`.
    pub file_url: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    pub fn new(
        appointment_id: Uuid,
        user_id: Uuid,
        doc_id: Uuid,
        file_url: String,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id,
            user_id,
            doc_id,
            file_url,
            notes,
            created_at: Utc::now(),
        }
    }
}
