//! Persistence functions, one module per collection.
//!
//! All functions take a `&rusqlite::Connection` so handlers and tests
//! control locking.

pub mod appointment;
pub mod doctor;
pub mod lab;
pub mod otp;
pub mod prescription;
pub mod registration;
pub mod session;
pub mod slot;
pub mod user;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    s.parse::<DateTime<Utc>>()
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_json(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or(serde_json::Value::Null)
}
