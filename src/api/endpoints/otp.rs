//! Phone verification codes, delivered over WhatsApp.
//!
//! Each send replaces any previous code for the phone; verification is a
//! single-use exact match within the configured expiry window.

use std::sync::OnceLock;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;

use crate::api::endpoints::Ack;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::otp as otp_repo;
use crate::models::PhoneOtp;
use crate::services::otp;

#[derive(Deserialize)]
pub struct SendRequest {
    pub phone: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub code: String,
}

fn valid_phone(phone: &str) -> bool {
    static PHONE_RE: OnceLock<Regex> = OnceLock::new();
    PHONE_RE
        .get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("literal regex"))
        .is_match(phone)
}

/// `POST /api/otp/send`
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(payload): Json<SendRequest>,
) -> Result<Json<Ack>, ApiError> {
    if !valid_phone(&payload.phone) {
        return Err(ApiError::BadRequest("Please enter a valid phone number".into()));
    }

    let code = otp::generate_code();
    let expiry_minutes = ctx.config.otp_expiry_minutes;
    let challenge = PhoneOtp::new(
        payload.phone.clone(),
        code.clone(),
        Utc::now() + chrono::Duration::minutes(expiry_minutes),
    );

    {
        let conn = ctx.db.conn()?;
        otp_repo::delete_expired(&conn, Utc::now())?;
        otp_repo::replace_code(&conn, &challenge)?;
    }

    ctx.notifier
        .send_otp_whatsapp(&payload.phone, &code, expiry_minutes)
        .await?;
    tracing::info!(phone = %payload.phone, "Phone OTP issued");
    Ok(Ack::ok("OTP sent successfully"))
}

/// `POST /api/otp/verify`
pub async fn verify(
    State(ctx): State<ApiContext>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<Ack>, ApiError> {
    let conn = ctx.db.conn()?;
    let challenge = otp_repo::find_pending(&conn, &payload.phone, &payload.code)?
        .ok_or_else(|| ApiError::BadRequest("Invalid OTP".into()))?;

    if challenge.is_expired(Utc::now()) {
        return Err(ApiError::BadRequest("OTP has expired".into()));
    }

    otp_repo::mark_verified(&conn, &payload.phone, &payload.code)?;
    Ok(Ack::ok("OTP verified successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(valid_phone("+911234567890"));
        assert!(valid_phone("9876543210"));
        assert!(!valid_phone("12345"));
        assert!(!valid_phone("+91 12345 67890"));
        assert!(!valid_phone("not-a-phone"));
    }
}
