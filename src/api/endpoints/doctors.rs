//! Doctor endpoints: self-registration, login, panel operations, and the
//! public catalogue.

use std::collections::HashSet;

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::auth::valid_email;
use crate::api::endpoints::Ack;
use crate::api::error::ApiError;
use crate::api::types::{issue_session, ApiContext, AuthContext};
use crate::db::repository::{appointment, doctor, registration, slot};
use crate::models::{Appointment, Doctor, DoctorRegistration, DoctorService, Role};
use crate::services::credentials;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience_years: i64,
    pub clinic_address: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct AppointmentIdRequest {
    pub appointment_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub fees: i64,
    pub address: serde_json::Value,
    pub available: bool,
    #[serde(default)]
    pub services: Vec<DoctorService>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub success: bool,
    pub appointments: Vec<Appointment>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub doctor: Doctor,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub doctors: Vec<DoctorWithSlots>,
}

/// Catalogue entry: the doctor plus their currently booked slots, so
/// clients can grey out taken times.
#[derive(Serialize)]
pub struct DoctorWithSlots {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub slots_booked: std::collections::HashMap<String, Vec<String>>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub earnings: i64,
    pub appointments: usize,
    pub patients: usize,
    pub latest_appointments: Vec<Appointment>,
}

/// `POST /api/doctor/register` — public, lands in the review queue.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Ack>, ApiError> {
    if !valid_email(&payload.email) {
        return Err(ApiError::BadRequest("Please enter a valid email".into()));
    }
    if payload.name.trim().is_empty() || payload.specialization.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Name and specialization are required".into(),
        ));
    }
    if payload.experience_years < 0 {
        return Err(ApiError::BadRequest("Invalid experience".into()));
    }

    let reg = DoctorRegistration::new(
        payload.name,
        payload.email,
        payload.phone,
        payload.specialization,
        payload.experience_years,
        payload.clinic_address,
    );

    {
        let conn = ctx.db.conn()?;
        if registration::email_exists(&conn, &reg.email)? {
            return Err(ApiError::Conflict("Registration already submitted".into()));
        }
        if doctor::get_doctor_by_email(&conn, &reg.email)?.is_some() {
            return Err(ApiError::Conflict("Doctor already exists".into()));
        }
        registration::insert_registration(&conn, &reg)?;
    }

    let html = format!(
        "<p>New doctor registration awaiting review:</p>\
         <p><b>{}</b> ({}), {} — {} years experience</p>",
        reg.name, reg.email, reg.specialization, reg.experience_years
    );
    ctx.notifier
        .send_email(&ctx.config.admin_email, "New doctor registration", &html)
        .await?;

    tracing::info!(registration = %reg.id, "Doctor registration submitted");
    Ok(Ack::ok("Registration submitted for review"))
}

/// `POST /api/doctor/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.db.conn()?;
    let doc = doctor::get_doctor_by_email(&conn, &payload.email)?
        .ok_or(ApiError::Unauthorized)?;
    if !credentials::verify_password(&payload.password, &doc.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = issue_session(&conn, &doc.id.to_string(), Role::Doctor)?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        token,
    }))
}

/// `GET /api/doctor/appointments`
pub async fn appointments(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let appointments = appointment::list_for_doctor(&conn, &doc_id)?;
    Ok(Json(AppointmentsResponse {
        success: true,
        appointments,
    }))
}

/// Load an appointment and check it belongs to the calling doctor.
fn owned_appointment(
    conn: &rusqlite::Connection,
    doc_id: Uuid,
    appointment_id: &Uuid,
) -> Result<Appointment, ApiError> {
    let appt = appointment::get_appointment(conn, appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.doc_id != Some(doc_id) {
        return Err(ApiError::Forbidden("Not your appointment".into()));
    }
    Ok(appt)
}

/// `POST /api/doctor/cancel-appointment`
pub async fn cancel_appointment(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<AppointmentIdRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let appt = owned_appointment(&conn, doc_id, &payload.appointment_id)?;
    if appt.cancelled {
        return Err(ApiError::Conflict("Appointment already cancelled".into()));
    }

    appointment::set_cancelled(&conn, &appt.id)?;
    slot::release(&conn, &doc_id, &appt.slot_date, &appt.slot_time)?;
    Ok(Ack::ok("Appointment Cancelled"))
}

/// `POST /api/doctor/complete-appointment`
pub async fn complete_appointment(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<AppointmentIdRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let appt = owned_appointment(&conn, doc_id, &payload.appointment_id)?;
    if appt.cancelled {
        return Err(ApiError::Conflict("Appointment was cancelled".into()));
    }

    appointment::set_completed(&conn, &appt.id)?;
    Ok(Ack::ok("Appointment Completed"))
}

/// `GET /api/doctor/profile`
pub async fn profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ProfileResponse>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let doc = doctor::get_doctor_by_id(&conn, &doc_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    Ok(Json(ProfileResponse {
        success: true,
        doctor: doc,
    }))
}

/// `POST /api/doctor/update-profile`
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;
    if payload.fees < 0 {
        return Err(ApiError::BadRequest("Invalid fee".into()));
    }

    let conn = ctx.db.conn()?;
    doctor::get_doctor_by_id(&conn, &doc_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    doctor::update_profile(&conn, &doc_id, payload.fees, &payload.address, payload.available)?;
    doctor::replace_services(&conn, &doc_id, &payload.services)?;
    Ok(Ack::ok("Profile Updated"))
}

/// `POST /api/doctor/change-availability` — toggle.
pub async fn change_availability(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let doc = doctor::get_doctor_by_id(&conn, &doc_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    doctor::set_available(&conn, &doc_id, !doc.available)?;
    Ok(Ack::ok("Availability Changed"))
}

/// `GET /api/doctor/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardResponse>, ApiError> {
    auth.require(Role::Doctor)?;
    let doc_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let all = appointment::list_for_doctor(&conn, &doc_id)?;

    let earnings: i64 = all
        .iter()
        .filter(|a| a.payment || a.is_completed)
        .map(|a| a.amount)
        .sum();
    let patients: HashSet<Uuid> = all.iter().map(|a| a.user_id).collect();
    let latest = all.iter().take(5).cloned().collect();

    Ok(Json(DashboardResponse {
        success: true,
        earnings,
        appointments: all.len(),
        patients: patients.len(),
        latest_appointments: latest,
    }))
}

/// `GET /api/doctor/list` — public catalogue, secrets skipped by serde.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<ListResponse>, ApiError> {
    let conn = ctx.db.conn()?;
    let mut doctors = Vec::new();
    for doc in doctor::list_doctors(&conn)? {
        let slots_booked = slot::slots_booked(&conn, &doc.id)?;
        doctors.push(DoctorWithSlots {
            doctor: doc,
            slots_booked,
        });
    }
    Ok(Json(ListResponse {
        success: true,
        doctors,
    }))
}
