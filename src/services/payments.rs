//! Payment gateway clients.
//!
//! Two integration shapes, mirroring the providers the product supports:
//! an order API (create + fetch, server-side verification of the paid
//! status) and a hosted checkout API (create a session, client redirects
//! and reports the outcome). Base URLs are configurable so tests can point
//! them at a local stub; an unconfigured gateway refuses to create orders.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment gateway not configured")]
    NotConfigured,

    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected request: {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// An order as reported by the order gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    /// Amount in minor currency units (paise/cents).
    pub amount: i64,
    pub currency: String,
    /// Our appointment id, echoed back by the gateway.
    pub receipt: String,
    /// Gateway status, e.g. `created`, `paid`.
    pub status: String,
}

impl PaymentOrder {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}

/// Razorpay-style order API client.
#[derive(Clone)]
pub struct OrderGateway {
    client: reqwest::Client,
    base_url: Option<String>,
    key_id: String,
    key_secret: String,
    currency: String,
}

impl OrderGateway {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.payment_api_url.clone(),
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Create an order for `amount` whole currency units, tagged with the
    /// appointment id as receipt. The gateway expects minor units.
    pub async fn create_order(
        &self,
        amount: i64,
        receipt: &str,
    ) -> Result<PaymentOrder, PaymentError> {
        let base = self.base_url.as_ref().ok_or(PaymentError::NotConfigured)?;
        let response = self
            .client
            .post(format!("{base}/v1/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount * 100,
                "currency": self.currency,
                "receipt": receipt,
            }))
            .send()
            .await?;
        parse_order(response).await
    }

    /// Fetch an order to verify its paid status server-side.
    pub async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError> {
        let base = self.base_url.as_ref().ok_or(PaymentError::NotConfigured)?;
        let response = self
            .client
            .get(format!("{base}/v1/orders/{order_id}"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        parse_order(response).await
    }
}

/// A hosted checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect URL for the client.
    pub url: String,
}

/// Stripe-style hosted checkout client.
#[derive(Clone)]
pub struct CheckoutGateway {
    client: reqwest::Client,
    base_url: Option<String>,
    secret: String,
    currency: String,
}

impl CheckoutGateway {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.checkout_api_url.clone(),
            secret: config.checkout_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    pub async fn create_session(
        &self,
        amount: i64,
        product_name: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let base = self.base_url.as_ref().ok_or(PaymentError::NotConfigured)?;
        let response = self
            .client
            .post(format!("{base}/v1/checkout/sessions"))
            .bearer_auth(&self.secret)
            .json(&json!({
                "amount": amount * 100,
                "currency": self.currency.to_lowercase(),
                "product_name": product_name,
                "success_url": success_url,
                "cancel_url": cancel_url,
                "mode": "payment",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

async fn parse_order(response: reqwest::Response) -> Result<PaymentOrder, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PaymentError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}
