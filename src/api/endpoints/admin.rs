//! Admin panel endpoints.
//!
//! The admin account is not a database row; it logs in with the configured
//! credentials and its sessions carry a fixed account id.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::auth::valid_email;
use crate::api::endpoints::Ack;
use crate::api::error::ApiError;
use crate::api::types::{issue_session, ApiContext, AuthContext};
use crate::db::repository::{appointment, doctor, lab, registration, slot, user};
use crate::models::{
    Appointment, Doctor, DoctorRegistration, Lab, RegistrationStatus, Role,
};
use crate::services::{credentials, media};

/// Account id carried by admin sessions.
pub const ADMIN_ACCOUNT_ID: &str = "admin";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct DoctorIdRequest {
    pub doc_id: Uuid,
}

#[derive(Deserialize)]
pub struct LabIdRequest {
    pub lab_id: Uuid,
}

#[derive(Deserialize)]
pub struct AppointmentIdRequest {
    pub appointment_id: Uuid,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub registration_id: Uuid,
    pub approve: bool,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct DoctorsResponse {
    pub success: bool,
    pub doctors: Vec<Doctor>,
}

#[derive(Serialize)]
pub struct LabsResponse {
    pub success: bool,
    pub labs: Vec<Lab>,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub success: bool,
    pub appointments: Vec<Appointment>,
}

#[derive(Serialize)]
pub struct RegistrationsResponse {
    pub success: bool,
    pub registrations: Vec<DoctorRegistration>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub doctors: i64,
    pub patients: i64,
    pub appointments: i64,
    pub latest_appointments: Vec<Appointment>,
}

/// `POST /api/admin/login` — credentials come from configuration.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if ctx.config.admin_password.is_empty() {
        return Err(ApiError::ServiceUnavailable("Admin login is disabled".into()));
    }
    if payload.email != ctx.config.admin_email
        || payload.password != ctx.config.admin_password
    {
        return Err(ApiError::Unauthorized);
    }

    let conn = ctx.db.conn()?;
    let token = issue_session(&conn, ADMIN_ACCOUNT_ID, Role::Admin)?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        token,
    }))
}

/// Multipart fields collected for `add-doctor` / `add-lab`.
struct FormData {
    text: std::collections::HashMap<String, String>,
    image: Option<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> Result<FormData, ApiError> {
    let mut text = std::collections::HashMap::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Unreadable upload: {e}")))?;
            image = Some((file_name, bytes.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Unreadable field: {e}")))?;
            text.insert(name, value);
        }
    }
    Ok(FormData { text, image })
}

impl FormData {
    fn required(&self, key: &str) -> Result<String, ApiError> {
        self.text
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| ApiError::BadRequest(format!("Missing field: {key}")))
    }

    fn optional(&self, key: &str) -> String {
        self.text.get(key).cloned().unwrap_or_default()
    }
}

/// `POST /api/admin/add-doctor` — multipart with profile image.
pub async fn add_doctor(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Admin)?;
    let form = read_form(multipart).await?;

    let email = form.required("email")?;
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("Please enter a valid email".into()));
    }
    let password = form.required("password")?;
    if password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    let fees: i64 = form
        .required("fees")?
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid fee".into()))?;
    let address: serde_json::Value = serde_json::from_str(&form.optional("address"))
        .unwrap_or_else(|_| serde_json::json!({}));

    let mut doc = Doctor::new(
        form.required("name")?,
        email,
        credentials::hash_password(&password)?,
        form.required("speciality")?,
        fees,
    );
    doc.degree = form.optional("degree");
    doc.experience = form.optional("experience");
    doc.about = form.optional("about");
    doc.phone = form.optional("phone");
    doc.address = address;

    if let Some((file_name, bytes)) = form.image {
        doc.image = media::store_upload(&ctx.config.uploads_dir(), "doctors", &file_name, &bytes)?;
    }

    let conn = ctx.db.conn()?;
    if doctor::get_doctor_by_email(&conn, &doc.email)?.is_some() {
        return Err(ApiError::Conflict("Doctor already exists".into()));
    }
    doctor::insert_doctor(&conn, &doc)?;

    tracing::info!(doctor = %doc.id, "Doctor added");
    Ok(Ack::ok("Doctor Added"))
}

/// `GET /api/admin/doctors`
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DoctorsResponse>, ApiError> {
    auth.require(Role::Admin)?;
    let conn = ctx.db.conn()?;
    Ok(Json(DoctorsResponse {
        success: true,
        doctors: doctor::list_doctors(&conn)?,
    }))
}

/// `POST /api/admin/change-availability` — toggle a doctor.
pub async fn change_availability(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<DoctorIdRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Admin)?;

    let conn = ctx.db.conn()?;
    let doc = doctor::get_doctor_by_id(&conn, &payload.doc_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    doctor::set_available(&conn, &doc.id, !doc.available)?;
    Ok(Ack::ok("Availability Changed"))
}

/// `GET /api/admin/appointments`
pub async fn appointments(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    auth.require(Role::Admin)?;
    let conn = ctx.db.conn()?;
    Ok(Json(AppointmentsResponse {
        success: true,
        appointments: appointment::list_all(&conn)?,
    }))
}

/// `POST /api/admin/cancel-appointment`
pub async fn cancel_appointment(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<AppointmentIdRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Admin)?;

    let conn = ctx.db.conn()?;
    let appt = appointment::get_appointment(&conn, &payload.appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.cancelled {
        return Err(ApiError::Conflict("Appointment already cancelled".into()));
    }

    appointment::set_cancelled(&conn, &appt.id)?;
    if let Some(doc_id) = appt.doc_id {
        slot::release(&conn, &doc_id, &appt.slot_date, &appt.slot_time)?;
    }
    Ok(Ack::ok("Appointment Cancelled"))
}

/// `GET /api/admin/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardResponse>, ApiError> {
    auth.require(Role::Admin)?;

    let conn = ctx.db.conn()?;
    let latest = appointment::list_all(&conn)?
        .into_iter()
        .take(5)
        .collect();
    Ok(Json(DashboardResponse {
        success: true,
        doctors: doctor::count_doctors(&conn)?,
        patients: user::count_users(&conn)?,
        appointments: appointment::count_appointments(&conn)?,
        latest_appointments: latest,
    }))
}

/// `GET /api/admin/registrations`
pub async fn registrations(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<RegistrationsResponse>, ApiError> {
    auth.require(Role::Admin)?;
    let conn = ctx.db.conn()?;
    Ok(Json(RegistrationsResponse {
        success: true,
        registrations: registration::list_registrations(&conn)?,
    }))
}

/// `POST /api/admin/review-registration` — approve creates the doctor with
/// a generated one-time password, emailed to them.
pub async fn review_registration(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Admin)?;

    let approved = {
        let conn = ctx.db.conn()?;
        let reg = registration::get_registration(&conn, &payload.registration_id)?
            .ok_or_else(|| ApiError::NotFound("Registration not found".into()))?;
        if reg.status != RegistrationStatus::Pending {
            return Err(ApiError::Conflict("Registration already reviewed".into()));
        }

        if !payload.approve {
            registration::set_status(&conn, &reg.id, RegistrationStatus::Rejected)?;
            None
        } else {
            if doctor::get_doctor_by_email(&conn, &reg.email)?.is_some() {
                return Err(ApiError::Conflict("Doctor already exists".into()));
            }
            let temp_password = credentials::generate_token();
            let mut doc = Doctor::new(
                reg.name.clone(),
                reg.email.clone(),
                credentials::hash_password(&temp_password)?,
                reg.specialization.clone(),
                0,
            );
            doc.experience = format!("{} years", reg.experience_years);
            doc.phone = reg.phone.clone();
            doc.address = serde_json::json!({ "line1": reg.clinic_address });
            doctor::insert_doctor(&conn, &doc)?;
            registration::set_status(&conn, &reg.id, RegistrationStatus::Approved)?;
            Some((reg.email, reg.name, temp_password))
        }
    };

    match approved {
        Some((email, name, temp_password)) => {
            let html = format!(
                "<p>Hello Dr. {name},</p>\
                 <p>Your registration has been approved. Log in with the temporary \
                 password below and update your profile:</p>\
                 <p><code>{temp_password}</code></p>"
            );
            ctx.notifier
                .send_email(&email, "Registration approved", &html)
                .await?;
            Ok(Ack::ok("Registration approved"))
        }
        None => Ok(Ack::ok("Registration rejected")),
    }
}

/// `POST /api/admin/add-lab` — multipart; services arrive comma-separated.
pub async fn add_lab(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Admin)?;
    let form = read_form(multipart).await?;

    let fees: i64 = form
        .required("fees")?
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid fee".into()))?;

    let mut new_lab = Lab::new(form.required("name")?, fees);
    new_lab.email = form.text.get("email").filter(|v| !v.is_empty()).cloned();
    new_lab.address = form.optional("address");
    new_lab.city = form.optional("city");
    new_lab.phone = form.optional("phone");
    new_lab.about = form.optional("about");
    new_lab.services = form
        .optional("services")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if let Some((file_name, bytes)) = form.image {
        new_lab.image =
            media::store_upload(&ctx.config.uploads_dir(), "labs", &file_name, &bytes)?;
    }

    let conn = ctx.db.conn()?;
    lab::insert_lab(&conn, &new_lab)?;

    tracing::info!(lab = %new_lab.id, "Lab added");
    Ok(Ack::ok("Lab Added"))
}

/// `GET /api/admin/labs`
pub async fn labs(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<LabsResponse>, ApiError> {
    auth.require(Role::Admin)?;
    let conn = ctx.db.conn()?;
    Ok(Json(LabsResponse {
        success: true,
        labs: lab::list_all(&conn)?,
    }))
}

/// `POST /api/admin/change-lab-availability` — toggle a lab.
pub async fn change_lab_availability(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<LabIdRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::Admin)?;

    let conn = ctx.db.conn()?;
    let found = lab::get_lab(&conn, &payload.lab_id)?
        .ok_or_else(|| ApiError::NotFound("Lab not found".into()))?;
    lab::set_available(&conn, &found.id, !found.available)?;
    Ok(Ack::ok("Availability Changed"))
}
