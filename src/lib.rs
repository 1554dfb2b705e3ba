//! Medibook — healthcare booking REST backend.
//!
//! Patients browse doctors and labs, book and pay for appointments, and
//! upload prescriptions; doctors and administrators manage their records
//! through the same API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

use tracing_subscriber::EnvFilter;

/// Initialise tracing from `RUST_LOG`, falling back to the app default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
