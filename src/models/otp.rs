use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short-lived phone verification code. Replaced wholesale on each send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneOtp {
    pub phone: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
}

impl PhoneOtp {
    pub fn new(phone: String, code: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            phone,
            code,
            expires_at,
            verified: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
