use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Diagnostic lab listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lab {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub image: String,
    pub address: String,
    pub city: String,
    pub phone: String,
    pub about: String,
    /// Offered tests/services, by name.
    #[serde(default)]
    pub services: Vec<String>,
    /// Representative fee in whole currency units.
    pub fees: i64,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl Lab {
    pub fn new(name: String, fees: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email: None,
            image: String::new(),
            address: String::new(),
            city: String::new(),
            phone: String::new(),
            about: String::new(),
            services: Vec::new(),
            fees,
            available: true,
            created_at: Utc::now(),
        }
    }
}
