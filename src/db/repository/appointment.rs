use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_json, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Appointment;

const COLUMNS: &str = "id, user_id, doc_id, lab_id, slot_date, slot_time, amount,
         user_snapshot, provider_snapshot, cancelled, is_completed, payment,
         prescription_id, created_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, user_id, doc_id, lab_id, slot_date, slot_time, amount,
         user_snapshot, provider_snapshot, cancelled, is_completed, payment,
         prescription_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            appt.id.to_string(),
            appt.user_id.to_string(),
            appt.doc_id.map(|id| id.to_string()),
            appt.lab_id.map(|id| id.to_string()),
            appt.slot_date,
            appt.slot_time,
            appt.amount,
            appt.user_snapshot.to_string(),
            appt.provider_snapshot.to_string(),
            appt.cancelled as i32,
            appt.is_completed as i32,
            appt.payment as i32,
            appt.prescription_id.map(|id| id.to_string()),
            appt.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = ?1");
    let row = conn
        .query_row(&query, params![id.to_string()], appointment_row)
        .optional()?;
    row.map(appointment_from_row).transpose()
}

pub fn list_for_user(conn: &Connection, user_id: &Uuid) -> Result<Vec<Appointment>, DatabaseError> {
    list_where(conn, "user_id = ?1", user_id)
}

pub fn list_for_doctor(conn: &Connection, doc_id: &Uuid) -> Result<Vec<Appointment>, DatabaseError> {
    list_where(conn, "doc_id = ?1", doc_id)
}

pub fn list_for_lab(conn: &Connection, lab_id: &Uuid) -> Result<Vec<Appointment>, DatabaseError> {
    list_where(conn, "lab_id = ?1", lab_id)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM appointments ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| Ok(appointment_row(row)))?;
    collect(rows)
}

fn list_where(
    conn: &Connection,
    clause: &str,
    id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM appointments WHERE {clause} ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params![id.to_string()], |row| Ok(appointment_row(row)))?;
    collect(rows)
}

fn collect<'a>(
    rows: impl Iterator<Item = rusqlite::Result<rusqlite::Result<AppointmentRow>>> + 'a,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row??)?);
    }
    Ok(appointments)
}

pub fn set_cancelled(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET cancelled = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

pub fn set_completed(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET is_completed = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

/// Mark paid. Only ever sets the flag, so repeated verifications are
/// harmless (idempotent by construction).
pub fn set_paid(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET payment = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

pub fn set_prescription(
    conn: &Connection,
    id: &Uuid,
    prescription_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET prescription_id = ?2 WHERE id = ?1",
        params![id.to_string(), prescription_id.to_string()],
    )?;
    Ok(())
}

pub fn count_appointments(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))?)
}

struct AppointmentRow {
    id: String,
    user_id: String,
    doc_id: Option<String>,
    lab_id: Option<String>,
    slot_date: String,
    slot_time: String,
    amount: i64,
    user_snapshot: String,
    provider_snapshot: String,
    cancelled: i32,
    is_completed: i32,
    payment: i32,
    prescription_id: Option<String>,
    created_at: String,
}

fn appointment_row(row: &rusqlite::Row<'_>) -> Result<AppointmentRow, rusqlite::Error> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        doc_id: row.get(2)?,
        lab_id: row.get(3)?,
        slot_date: row.get(4)?,
        slot_time: row.get(5)?,
        amount: row.get(6)?,
        user_snapshot: row.get(7)?,
        provider_snapshot: row.get(8)?,
        cancelled: row.get(9)?,
        is_completed: row.get(10)?,
        payment: row.get(11)?,
        prescription_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid(&row.id)?,
        user_id: parse_uuid(&row.user_id)?,
        doc_id: row.doc_id.as_deref().map(parse_uuid).transpose()?,
        lab_id: row.lab_id.as_deref().map(parse_uuid).transpose()?,
        slot_date: row.slot_date,
        slot_time: row.slot_time,
        amount: row.amount,
        user_snapshot: parse_json(&row.user_snapshot),
        provider_snapshot: parse_json(&row.provider_snapshot),
        cancelled: row.cancelled != 0,
        is_completed: row.is_completed != 0,
        payment: row.payment != 0,
        prescription_id: row.prescription_id.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_ts(&row.created_at)?,
    })
}
