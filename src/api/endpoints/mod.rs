//! API endpoint handlers.
//!
//! One module per account surface: patient, doctor, admin, plus the public
//! catalogue and OTP routes.

pub mod admin;
pub mod auth;
pub mod doctors;
pub mod health;
pub mod labs;
pub mod otp;
pub mod prescriptions;
pub mod users;

use axum::Json;
use serde::Serialize;

/// Plain acknowledgement envelope for endpoints with nothing else to return.
#[derive(Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Json<Ack> {
        Json(Ack {
            success: true,
            message: message.into(),
        })
    }
}
