//! Patient account flows: OTP-based registration and login.
//!
//! `send-otp` creates (or refreshes) the challenge, `verify-otp` consumes it
//! and issues a bearer token. Codes are single-use and expire after ten
//! minutes.

use std::sync::OnceLock;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::Ack;
use crate::api::error::ApiError;
use crate::api::types::{issue_session, ApiContext};
use crate::db::repository::user;
use crate::models::{Role, User};
use crate::services::credentials;
use crate::services::otp::{self, EMAIL_OTP_EXPIRY_MINUTES};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Register,
    Login,
}

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "type")]
    pub flow: Flow,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    #[serde(rename = "type")]
    pub flow: Flow,
}

#[derive(Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

pub(crate) fn valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("literal regex"))
        .is_match(email)
}

/// `POST /api/user/send-otp`
pub async fn send_otp(
    State(ctx): State<ApiContext>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<Json<Ack>, ApiError> {
    if !valid_email(&payload.email) {
        return Err(ApiError::BadRequest("Please enter a valid email".into()));
    }

    let code = otp::generate_code();
    let expiry = Utc::now() + chrono::Duration::minutes(EMAIL_OTP_EXPIRY_MINUTES);

    let recipient_name = match payload.flow {
        Flow::Register => {
            if payload.name.trim().is_empty() {
                return Err(ApiError::BadRequest("Name is required".into()));
            }
            if payload.password.len() < 8 {
                return Err(ApiError::BadRequest(
                    "Password must be at least 8 characters".into(),
                ));
            }
            let password_hash = credentials::hash_password(&payload.password)?;

            let conn = ctx.db.conn()?;
            match user::get_user_by_email(&conn, &payload.email)? {
                Some(existing) if existing.is_verified => {
                    return Err(ApiError::Conflict("Account already exists".into()));
                }
                Some(existing) => {
                    // Repeated registration before verification overwrites
                    user::update_unverified_registration(
                        &conn,
                        &existing.id,
                        &payload.name,
                        &password_hash,
                        &code,
                        expiry,
                    )?;
                }
                None => {
                    let mut new_user =
                        User::new(payload.name.clone(), payload.email.clone(), password_hash);
                    new_user.otp = Some(code.clone());
                    new_user.otp_expiry = Some(expiry);
                    user::insert_user(&conn, &new_user)?;
                }
            }
            payload.name.clone()
        }
        Flow::Login => {
            let conn = ctx.db.conn()?;
            let account = user::get_user_by_email(&conn, &payload.email)?
                .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
            if !account.is_verified {
                return Err(ApiError::Forbidden("Account is not verified".into()));
            }
            if !credentials::verify_password(&payload.password, &account.password_hash) {
                return Err(ApiError::Unauthorized);
            }
            user::set_otp(&conn, &account.id, &code, expiry)?;
            account.name
        }
    };

    ctx.notifier
        .send_otp_email(&payload.email, &recipient_name, &code)
        .await?;
    tracing::info!(email = %payload.email, "OTP issued");
    Ok(Ack::ok("OTP sent to your email"))
}

/// `POST /api/user/verify-otp`
pub async fn verify_otp(
    State(ctx): State<ApiContext>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let conn = ctx.db.conn()?;
    let account = user::get_user_by_email(&conn, &payload.email)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    if account.otp.as_deref() != Some(payload.otp.as_str()) {
        return Err(ApiError::BadRequest("Invalid OTP".into()));
    }
    match account.otp_expiry {
        Some(expiry) if expiry >= Utc::now() => {}
        _ => return Err(ApiError::BadRequest("OTP has expired".into())),
    }

    let mark_verified = payload.flow == Flow::Register;
    user::clear_otp(&conn, &account.id, mark_verified)?;
    let token = issue_session(&conn, &account.id.to_string(), Role::User)?;

    let refreshed = user::get_user_by_id(&conn, &account.id)?
        .ok_or_else(|| ApiError::Internal("Account vanished during verification".into()))?;

    let message = match payload.flow {
        Flow::Register => "Email verified successfully",
        Flow::Login => "Login successful",
    };
    Ok(Json(VerifyOtpResponse {
        success: true,
        message: message.into(),
        token,
        user: refreshed,
    }))
}

/// `POST /api/user/resend-otp`
pub async fn resend_otp(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ResendOtpRequest>,
) -> Result<Json<Ack>, ApiError> {
    let code = otp::generate_code();
    let expiry = Utc::now() + chrono::Duration::minutes(EMAIL_OTP_EXPIRY_MINUTES);

    let name = {
        let conn = ctx.db.conn()?;
        let account = user::get_user_by_email(&conn, &payload.email)?
            .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
        user::set_otp(&conn, &account.id, &code, expiry)?;
        account.name
    };

    ctx.notifier
        .send_otp_email(&payload.email, &name, &code)
        .await?;
    Ok(Ack::ok("OTP resent to your email"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(valid_email("asha@example.com"));
        assert!(valid_email("a.b+c@sub.domain.in"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing@tld"));
        assert!(!valid_email("two@@example.com"));
    }
}
