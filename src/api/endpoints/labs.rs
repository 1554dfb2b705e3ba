//! Public lab catalogue.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::lab;
use crate::models::Lab;

#[derive(Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub labs: Vec<Lab>,
}

#[derive(Serialize)]
pub struct DetailResponse {
    pub success: bool,
    pub lab: Lab,
}

/// `GET /api/labs` — available labs, newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<ListResponse>, ApiError> {
    let conn = ctx.db.conn()?;
    Ok(Json(ListResponse {
        success: true,
        labs: lab::list_available(&conn)?,
    }))
}

/// `GET /api/labs/:id` — unavailable labs are hidden from the public view.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailResponse>, ApiError> {
    let conn = ctx.db.conn()?;
    let found = lab::get_lab(&conn, &id)?
        .filter(|l| l.available)
        .ok_or_else(|| ApiError::NotFound("Lab not found".into()))?;
    Ok(Json(DetailResponse {
        success: true,
        lab: found,
    }))
}
