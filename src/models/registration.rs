use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RegistrationStatus;

/// Doctor self-registration request awaiting admin review.
/// Kept separate from the approved `doctors` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRegistration {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience_years: i64,
    pub clinic_address: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

impl DoctorRegistration {
    pub fn new(
        name: String,
        email: String,
        phone: String,
        specialization: String,
        experience_years: i64,
        clinic_address: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            phone,
            specialization,
            experience_years,
            clinic_address,
            status: RegistrationStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
