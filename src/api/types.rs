//! Shared request state: the API context injected into every handler, the
//! authenticated caller identity, and the sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::config::Config;
use crate::db::repository::session;
use crate::db::{Db, DatabaseError};
use crate::models::Role;
use crate::services::credentials;
use crate::services::notify::Notifier;
use crate::services::payments::{CheckoutGateway, OrderGateway};

/// Bearer sessions live this long before re-login is required.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Everything a request handler needs, cloned per request.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Db,
    pub config: Arc<Config>,
    pub orders: OrderGateway,
    pub checkout: CheckoutGateway,
    pub notifier: Notifier,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(db: Db, config: Config) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_per_minute, config.rate_per_hour);
        Self {
            db,
            orders: OrderGateway::from_config(&config),
            checkout: CheckoutGateway::from_config(&config),
            notifier: Notifier::from_config(&config),
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            config: Arc::new(config),
        }
    }
}

/// The authenticated caller, resolved by the auth middleware from the
/// bearer token and injected as a request extension.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: String,
    pub role: Role,
}

impl AuthContext {
    /// Reject callers whose role doesn't match.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "This action requires a {} account",
                role.as_str()
            )))
        }
    }

    /// Account id as a UUID. Admin sessions carry a fixed non-UUID id, so
    /// this is only valid after `require(User)` or `require(Doctor)`.
    pub fn account_uuid(&self) -> Result<Uuid, ApiError> {
        Uuid::parse_str(&self.account_id)
            .map_err(|_| ApiError::Internal(format!("Malformed account id: {}", self.account_id)))
    }
}

/// Create a session row and return the raw bearer token to hand the client.
/// Only the token's hash is persisted.
pub fn issue_session(
    conn: &Connection,
    account_id: &str,
    role: Role,
) -> Result<String, DatabaseError> {
    let token = credentials::generate_token();
    let expires_at = Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS);
    session::insert_session(conn, &credentials::hash_token(&token), account_id, role, expires_at)?;
    Ok(token)
}

/// Sliding-window request limiter keyed by caller.
///
/// Two windows per key (minute and hour); timestamps older than an hour are
/// pruned on every check so the map stays bounded by active callers.
pub struct RateLimiter {
    per_minute: u32,
    per_hour: u32,
    hits: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32) -> Self {
        Self {
            per_minute,
            per_hour,
            hits: HashMap::new(),
        }
    }

    /// Record a request for `key`. Returns the seconds to wait when the
    /// caller is over either window.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let window = self.hits.entry(key.to_string()).or_default();

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) > Duration::from_secs(3600) {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.per_hour as usize {
            let oldest = window.front().copied().unwrap_or(now);
            let elapsed = now.duration_since(oldest).as_secs();
            return Err(3600_u64.saturating_sub(elapsed).max(1));
        }

        let minute_ago = Duration::from_secs(60);
        let recent = window
            .iter()
            .rev()
            .take_while(|t| now.duration_since(**t) <= minute_ago)
            .count();
        if recent >= self.per_minute as usize {
            // A zero cap rejects everything; there is no oldest hit to age out
            let elapsed = if recent > 0 {
                let oldest_recent = window[window.len() - recent];
                now.duration_since(oldest_recent).as_secs()
            } else {
                0
            };
            return Err(60_u64.saturating_sub(elapsed).max(1));
        }

        window.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_up_to_minute_cap() {
        let mut limiter = RateLimiter::new(3, 100);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        let retry = limiter.check("a").unwrap_err();
        assert!(retry >= 1 && retry <= 60);
    }

    #[test]
    fn zero_minute_cap_rejects_without_panicking() {
        let mut limiter = RateLimiter::new(0, 100);
        let retry = limiter.check("a").unwrap_err();
        assert!(retry >= 1 && retry <= 60);
        // Still rejecting, still not panicking, window stays empty
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn limiter_keys_are_independent() {
        let mut limiter = RateLimiter::new(1, 100);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn hour_cap_applies() {
        let mut limiter = RateLimiter::new(1000, 2);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn require_role_matches() {
        let auth = AuthContext {
            account_id: Uuid::new_v4().to_string(),
            role: Role::Doctor,
        };
        assert!(auth.require(Role::Doctor).is_ok());
        assert!(auth.require(Role::Admin).is_err());
        assert!(auth.account_uuid().is_ok());
    }

    #[test]
    fn issued_session_resolves_by_hash() {
        let conn = crate::db::sqlite::open_memory_database().unwrap();
        let token = issue_session(&conn, "acct-9", Role::User).unwrap();

        let found = session::find_valid(&conn, &credentials::hash_token(&token), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(found.account_id, "acct-9");
        // The raw token is never stored
        assert!(session::find_valid(&conn, &token, Utc::now()).unwrap().is_none());
    }
}
