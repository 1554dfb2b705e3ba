//! Outbound message delivery: transactional email and WhatsApp.
//!
//! Both channels are plain HTTP APIs driven by `reqwest`. When a channel's
//! endpoint is not configured the message is logged instead of sent, so the
//! server (and the test suite) runs without external accounts.

use serde_json::json;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery rejected: {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    email_api_url: Option<String>,
    email_api_key: String,
    email_from: String,
    whatsapp_api_url: Option<String>,
    whatsapp_account: String,
    whatsapp_token: String,
    whatsapp_from: String,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            email_api_url: config.email_api_url.clone(),
            email_api_key: config.email_api_key.clone(),
            email_from: config.email_from.clone(),
            whatsapp_api_url: config.whatsapp_api_url.clone(),
            whatsapp_account: config.whatsapp_account.clone(),
            whatsapp_token: config.whatsapp_token.clone(),
            whatsapp_from: config.whatsapp_from.clone(),
        }
    }

    /// Send a transactional email. Logged-and-dropped when unconfigured.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), NotifyError> {
        let Some(url) = &self.email_api_url else {
            tracing::warn!(to, subject, "Email channel not configured; message dropped");
            tracing::debug!(body = html, "Dropped email body");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.email_api_key)
            .json(&json!({
                "from": self.email_from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        ensure_accepted(response).await
    }

    /// Send a WhatsApp message. Logged-and-dropped when unconfigured.
    pub async fn send_whatsapp(&self, phone: &str, body: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.whatsapp_api_url else {
            tracing::warn!(phone, "WhatsApp channel not configured; message dropped");
            tracing::debug!(body, "Dropped WhatsApp body");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .basic_auth(&self.whatsapp_account, Some(&self.whatsapp_token))
            .form(&[
                ("From", format!("whatsapp:{}", self.whatsapp_from)),
                ("To", format!("whatsapp:{phone}")),
                ("Body", body.to_string()),
            ])
            .send()
            .await?;

        ensure_accepted(response).await
    }

    /// OTP email used by registration and login.
    pub async fn send_otp_email(
        &self,
        email: &str,
        name: &str,
        code: &str,
    ) -> Result<(), NotifyError> {
        let html = format!(
            "<div style=\"font-family: Arial, sans-serif;\">\
             <h2>Medibook Email Verification</h2>\
             <p>Hello {name},</p>\
             <p>Your OTP for email verification is:</p>\
             <h1>{code}</h1>\
             <p>This OTP will expire in 10 minutes. If you didn't request this, \
             please ignore this email.</p>\
             </div>"
        );
        self.send_email(email, "Medibook - Email Verification OTP", &html)
            .await
    }

    /// WhatsApp OTP used for phone verification.
    pub async fn send_otp_whatsapp(
        &self,
        phone: &str,
        code: &str,
        expiry_minutes: i64,
    ) -> Result<(), NotifyError> {
        let body = format!(
            "Your verification OTP is {code}. It is valid for {expiry_minutes} minutes."
        );
        self.send_whatsapp(phone, &body).await
    }
}

async fn ensure_accepted(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    #[tokio::test]
    async fn unconfigured_channels_drop_without_error() {
        let notifier = Notifier::from_config(&Config::for_tests(PathBuf::from("/tmp")));
        notifier
            .send_otp_email("user@example.com", "Asha", "123456")
            .await
            .unwrap();
        notifier
            .send_otp_whatsapp("+911234567890", "123456", 5)
            .await
            .unwrap();
    }
}
