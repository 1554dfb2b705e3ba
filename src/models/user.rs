use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient account.
///
/// The OTP columns double as both registration and login challenge state:
/// a fresh code overwrites whatever was there, and verification clears it.
/// Secrets never leave the server — they are skipped on serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expiry: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub image: String,
    pub phone: String,
    /// Free-form address object, stored as JSON text.
    pub address: serde_json::Value,
    pub dob: String,
    pub gender: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            otp: None,
            otp_expiry: None,
            is_verified: false,
            image: String::new(),
            phone: String::new(),
            address: serde_json::json!({}),
            dob: String::new(),
            gender: String::new(),
            created_at: Utc::now(),
        }
    }
}
