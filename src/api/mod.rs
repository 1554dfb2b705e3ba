//! REST API layer.
//!
//! Routes are nested under `/api/` and protected by a middleware stack:
//! Rate limit → Auth → Handler. All responses share the
//! `{success, message?, ...}` envelope.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{ApiServer, start_server};
pub use types::ApiContext;
