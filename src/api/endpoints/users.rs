//! Patient endpoints: profile, booking, payments.
//!
//! Booking takes the doctor slot with an atomic conditional insert, so two
//! competing requests for the same (doctor, date, time) cannot both succeed.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::Ack;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{appointment, doctor, lab, slot, user};
use crate::models::{Appointment, Role, User};
use crate::services::media;
use crate::services::payments::{CheckoutSession, PaymentOrder};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: User,
}

#[derive(Deserialize)]
pub struct BookAppointmentRequest {
    pub doc_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Deserialize)]
pub struct BookLabRequest {
    pub lab_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Deserialize)]
pub struct AppointmentIdRequest {
    pub appointment_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyOrderRequest {
    pub order_id: String,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub appointment_id: Uuid,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Deserialize)]
pub struct VerifyCheckoutRequest {
    pub appointment_id: Uuid,
    pub success: bool,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub success: bool,
    pub message: String,
    pub appointment: Appointment,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub success: bool,
    pub appointments: Vec<Appointment>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: PaymentOrder,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub session: CheckoutSession,
}

fn validate_slot(slot_date: &str, slot_time: &str) -> Result<(), ApiError> {
    if NaiveDate::parse_from_str(slot_date, "%Y-%m-%d").is_err() {
        return Err(ApiError::BadRequest("Invalid slot date".into()));
    }
    if slot_time.trim().is_empty() {
        return Err(ApiError::BadRequest("Slot time is required".into()));
    }
    Ok(())
}

/// `GET /api/user/get-profile`
pub async fn get_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ProfileResponse>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let account = user::get_user_by_id(&conn, &user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    Ok(Json(ProfileResponse {
        success: true,
        user: account,
    }))
}

/// `POST /api/user/update-profile` — multipart form with optional image.
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    let mut name = None;
    let mut phone = None;
    let mut address = None;
    let mut dob = None;
    let mut gender = None;
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable upload: {e}")))?;
                image = Some((file_name, bytes.to_vec()));
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable field: {e}")))?;
                match other {
                    "name" => name = Some(value),
                    "phone" => phone = Some(value),
                    "address" => address = Some(value),
                    "dob" => dob = Some(value),
                    "gender" => gender = Some(value),
                    _ => {}
                }
            }
        }
    }

    let name = name.ok_or_else(|| ApiError::BadRequest("Name is required".into()))?;
    let phone = phone.unwrap_or_default();
    let dob = dob.unwrap_or_default();
    let gender = gender.unwrap_or_default();
    let address: serde_json::Value = match address {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|_| ApiError::BadRequest("Malformed address".into()))?,
        None => serde_json::json!({}),
    };

    let image_url = match image {
        Some((file_name, bytes)) => Some(media::store_upload(
            &ctx.config.uploads_dir(),
            "profiles",
            &file_name,
            &bytes,
        )?),
        None => None,
    };

    let conn = ctx.db.conn()?;
    user::get_user_by_id(&conn, &user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    user::update_profile(&conn, &user_id, &name, &phone, &address, &dob, &gender)?;
    if let Some(url) = image_url {
        user::set_image(&conn, &user_id, &url)?;
    }
    Ok(Ack::ok("Profile updated"))
}

/// `POST /api/user/book-appointment`
pub async fn book_appointment(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<BookAppointmentRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;
    validate_slot(&payload.slot_date, &payload.slot_time)?;

    let conn = ctx.db.conn()?;
    let patient = user::get_user_by_id(&conn, &user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    let doc = doctor::get_doctor_by_id(&conn, &payload.doc_id)?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    if !doc.available {
        return Err(ApiError::Conflict("Doctor Not Available".into()));
    }

    if !slot::try_reserve(&conn, &doc.id, &payload.slot_date, &payload.slot_time)? {
        return Err(ApiError::Conflict("Slot Not Available".into()));
    }

    let user_snapshot = serde_json::to_value(&patient)
        .map_err(|e| ApiError::Internal(format!("Snapshot failed: {e}")))?;
    let doctor_snapshot = serde_json::to_value(&doc)
        .map_err(|e| ApiError::Internal(format!("Snapshot failed: {e}")))?;

    let appt = Appointment::for_doctor(
        user_id,
        doc.id,
        payload.slot_date.clone(),
        payload.slot_time.clone(),
        doc.fees,
        user_snapshot,
        doctor_snapshot,
    );
    if let Err(e) = appointment::insert_appointment(&conn, &appt) {
        // Give the slot back if the appointment row failed to land
        slot::release(&conn, &doc.id, &payload.slot_date, &payload.slot_time)?;
        return Err(e.into());
    }

    tracing::info!(appointment = %appt.id, doctor = %doc.id, "Appointment booked");
    Ok(Json(BookingResponse {
        success: true,
        message: "Appointment Booked".into(),
        appointment: appt,
    }))
}

/// `POST /api/user/book-lab`
pub async fn book_lab(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<BookLabRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;
    validate_slot(&payload.slot_date, &payload.slot_time)?;

    let conn = ctx.db.conn()?;
    let patient = user::get_user_by_id(&conn, &user_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    let lab_record = lab::get_lab(&conn, &payload.lab_id)?
        .ok_or_else(|| ApiError::NotFound("Lab not found".into()))?;
    if !lab_record.available {
        return Err(ApiError::Conflict("Lab Not Available".into()));
    }

    let user_snapshot = serde_json::to_value(&patient)
        .map_err(|e| ApiError::Internal(format!("Snapshot failed: {e}")))?;
    let lab_snapshot = serde_json::to_value(&lab_record)
        .map_err(|e| ApiError::Internal(format!("Snapshot failed: {e}")))?;

    let appt = Appointment::for_lab(
        user_id,
        lab_record.id,
        payload.slot_date.clone(),
        payload.slot_time.clone(),
        lab_record.fees,
        user_snapshot,
        lab_snapshot,
    );
    appointment::insert_appointment(&conn, &appt)?;

    tracing::info!(appointment = %appt.id, lab = %lab_record.id, "Lab visit booked");
    Ok(Json(BookingResponse {
        success: true,
        message: "Lab Appointment Booked".into(),
        appointment: appt,
    }))
}

/// `POST /api/user/cancel-appointment`
pub async fn cancel_appointment(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<AppointmentIdRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let appt = appointment::get_appointment(&conn, &payload.appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.user_id != user_id {
        return Err(ApiError::Forbidden("Not your appointment".into()));
    }
    if appt.cancelled {
        return Err(ApiError::Conflict("Appointment already cancelled".into()));
    }

    appointment::set_cancelled(&conn, &appt.id)?;
    if let Some(doc_id) = appt.doc_id {
        slot::release(&conn, &doc_id, &appt.slot_date, &appt.slot_time)?;
    }
    Ok(Ack::ok("Appointment Cancelled"))
}

/// `GET /api/user/appointments`
pub async fn list_appointments(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    let conn = ctx.db.conn()?;
    let appointments = appointment::list_for_user(&conn, &user_id)?;
    Ok(Json(AppointmentsResponse {
        success: true,
        appointments,
    }))
}

/// Shared pre-payment checks; returns the amount to charge.
fn payable_amount(
    ctx: &ApiContext,
    user_id: Uuid,
    appointment_id: &Uuid,
) -> Result<i64, ApiError> {
    let conn = ctx.db.conn()?;
    let appt = appointment::get_appointment(&conn, appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.user_id != user_id {
        return Err(ApiError::Forbidden("Not your appointment".into()));
    }
    if appt.cancelled {
        return Err(ApiError::BadRequest("Appointment was cancelled".into()));
    }
    if appt.payment {
        return Err(ApiError::Conflict("Appointment already paid".into()));
    }
    Ok(appt.amount)
}

/// `POST /api/user/payment-order`
pub async fn payment_order(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<AppointmentIdRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    auth.require(Role::User)?;
    let amount = payable_amount(&ctx, auth.account_uuid()?, &payload.appointment_id)?;

    let order = ctx
        .orders
        .create_order(amount, &payload.appointment_id.to_string())
        .await?;
    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

/// `POST /api/user/verify-order`
pub async fn verify_order(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<VerifyOrderRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    let order = ctx.orders.fetch_order(&payload.order_id).await?;
    if !order.is_paid() {
        return Err(ApiError::BadRequest("Payment not completed".into()));
    }

    let appointment_id = Uuid::parse_str(&order.receipt)
        .map_err(|_| ApiError::BadRequest("Order is not linked to an appointment".into()))?;

    let conn = ctx.db.conn()?;
    let appt = appointment::get_appointment(&conn, &appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.user_id != user_id {
        return Err(ApiError::Forbidden("Not your appointment".into()));
    }
    appointment::set_paid(&conn, &appointment_id)?;
    Ok(Ack::ok("Payment Successful"))
}

/// `POST /api/user/payment-checkout`
pub async fn payment_checkout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    auth.require(Role::User)?;
    let amount = payable_amount(&ctx, auth.account_uuid()?, &payload.appointment_id)?;

    let session = ctx
        .checkout
        .create_session(
            amount,
            "Appointment Fees",
            &payload.success_url,
            &payload.cancel_url,
        )
        .await?;
    Ok(Json(CheckoutResponse {
        success: true,
        session,
    }))
}

/// `POST /api/user/verify-checkout`
pub async fn verify_checkout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<VerifyCheckoutRequest>,
) -> Result<Json<Ack>, ApiError> {
    auth.require(Role::User)?;
    let user_id = auth.account_uuid()?;

    if !payload.success {
        return Err(ApiError::BadRequest("Payment not completed".into()));
    }

    let conn = ctx.db.conn()?;
    let appt = appointment::get_appointment(&conn, &payload.appointment_id)?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".into()))?;
    if appt.user_id != user_id {
        return Err(ApiError::Forbidden("Not your appointment".into()));
    }
    appointment::set_paid(&conn, &appt.id)?;
    Ok(Ack::ok("Payment Successful"))
}
