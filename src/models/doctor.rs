use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Approved doctor profile.
///
/// Booked slots live in their own table (`doctor_slots`) so reservations
/// can be made with an atomic conditional insert; the per-doctor
/// date → times view is assembled on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub available: bool,
    /// Consultation fee in whole currency units.
    pub fees: i64,
    pub phone: String,
    pub address: serde_json::Value,
    #[serde(default)]
    pub services: Vec<DoctorService>,
    pub created_at: DateTime<Utc>,
}

/// A named service a doctor offers, with its own fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorService {
    pub name: String,
    pub description: Option<String>,
    pub fee: Option<i64>,
    pub duration_minutes: Option<i64>,
}

impl Doctor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        speciality: String,
        fees: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            image: String::new(),
            speciality,
            degree: String::new(),
            experience: String::new(),
            about: String::new(),
            available: true,
            fees,
            phone: String::new(),
            address: serde_json::json!({}),
            services: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_not_serialized() {
        let doc = Doctor::new(
            "Dr. Rao".into(),
            "rao@example.com".into(),
            "hash".into(),
            "Dermatology".into(),
            500,
        );
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["speciality"], "Dermatology");
        assert_eq!(json["available"], true);
    }
}
