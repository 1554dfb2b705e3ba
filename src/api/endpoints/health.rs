//! Health check endpoints.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health` — connection check for clients.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok",
        version: crate::config::APP_VERSION,
    })
}

/// `GET /` — bare liveness text.
pub async fn root() -> &'static str {
    "API working"
}
