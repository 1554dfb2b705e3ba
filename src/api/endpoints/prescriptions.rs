//! Prescription uploads and per-role listings.
//!
//! One prescription per appointment; the database UNIQUE constraint backs
//! the handler check.

use axum::extract::{Multipart, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{appointment, prescription};
use crate::models::{Prescription, Role};
use crate::services::media;

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub prescription: Prescription,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub prescriptions: Vec<Prescription>,
}

#[derive(Deserialize)]
pub struct LabQuery {
    pub lab_id: Uuid,
}

/// `POST /api/prescription/upload` — multipart: file + appointment_id + notes.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    let mut appointment_id: Option<Uuid> = None;
    let mut notes: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let file_name = field.file_name().unwrap_or("prescription").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable upload: {e}")))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "appointment_id" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable field: {e}")))?;
                appointment_id = Some(
                    Uuid::parse_str(&raw)
                        .map_err(|_| ApiError::BadRequest("Invalid appointment id".into()))?,
                );
            }
            "notes" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable field: {e}")))?;
                if !value.trim().is_empty() {
                    notes = Some(value);
                }
            }
            _ => {}
        }
    }

    let appointment_id =
        appointment_id.ok_or_else(|| ApiError::BadRequest("Appointment id is required".into()))?;
    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("Prescription file is required".into()))?;

    let conn = ctx.db.conn()?;
    let appt = appointment::get_appointment(&conn, &appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.user_id != user_id {
        return Err(ApiError::Forbidden("Not your appointment".into()));
    }
    if appt.prescription_id.is_some()
        || prescription::get_by_appointment(&conn, &appointment_id)?.is_some()
    {
        return Err(ApiError::Conflict(
            "Prescription already uploaded for this appointment".into(),
        ));
    }

    let file_url = media::store_upload(
        &ctx.config.uploads_dir(),
        "prescriptions",
        &file_name,
        &bytes,
    )?;

    // Lab appointments carry no prescribing doctor
    let doc_id = appt.doc_id.unwrap_or_else(Uuid::nil);
    let rx = Prescription::new(appointment_id, user_id, doc_id, file_url, notes);
    prescription::insert_prescription(&conn, &rx)?;
    appointment::set_prescription(&conn, &appointment_id, &rx.id)?;

    tracing::info!(prescription = %rx.id, appointment = %appointment_id, "Prescription uploaded");
    Ok(Json(UploadResponse {
        success: true,
        message: "Prescription Uploaded".into(),
        prescription: rx,
    }))
}

/// `GET /api/prescription/doctor`
pub async fn for_doctor(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ListResponse>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    Ok(Json(ListResponse {
        success: true,
        prescriptions: prescription::list_for_doctor(&conn, &doc_id)?,
    }))
}

/// `GET /api/prescription/lab?lab_id=...` — admin view of a lab's queue.
pub async fn for_lab(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<LabQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    auth.require(Role::Admin)?;

    let conn = ctx.db.conn()?;
    Ok(Json(ListResponse {
        success: true,
        prescriptions: prescription::list_for_lab(&conn, &query.lab_id)?,
    }))
}

/// `GET /api/prescription/admin`
pub async fn for_admin(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ListResponse>, ApiError> {
    auth.require(Role::Admin)?;

    let conn = ctx.db.conn()?;
    Ok(Json(ListResponse {
        success: true,
        prescriptions: prescription::list_all(&conn)?,
    }))
}
