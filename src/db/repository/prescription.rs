use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Prescription;

const COLUMNS: &str = "id, appointment_id, user_id, doc_id, file_url, notes, created_at";

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, appointment_id, user_id, doc_id, file_url, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            rx.id.to_string(),
            rx.appointment_id.to_string(),
            rx.user_id.to_string(),
            rx.doc_id.to_string(),
            rx.file_url,
            rx.notes,
            rx.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM prescriptions WHERE appointment_id = ?1");
    let row = conn
        .query_row(&query, params![appointment_id.to_string()], rx_row)
        .optional()?;
    row.map(rx_from_row).transpose()
}

pub fn list_for_doctor(conn: &Connection, doc_id: &Uuid) -> Result<Vec<Prescription>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM prescriptions WHERE doc_id = ?1 ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params![doc_id.to_string()], |row| Ok(rx_row(row)))?;
    collect(rows)
}

/// Prescriptions attached to appointments handled by a lab.
pub fn list_for_lab(conn: &Connection, lab_id: &Uuid) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.appointment_id, p.user_id, p.doc_id, p.file_url, p.notes, p.created_at
         FROM prescriptions p
         JOIN appointments a ON a.prescription_id = p.id
         WHERE a.lab_id = ?1
         ORDER BY p.created_at DESC",
    )?;
    let rows = stmt.query_map(params![lab_id.to_string()], |row| Ok(rx_row(row)))?;
    collect(rows)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Prescription>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM prescriptions ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| Ok(rx_row(row)))?;
    collect(rows)
}

fn collect<'a>(
    rows: impl Iterator<Item = rusqlite::Result<rusqlite::Result<PrescriptionRow>>> + 'a,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut prescriptions = Vec::new();
    for row in rows {
        prescriptions.push(rx_from_row(row??)?);
    }
    Ok(prescriptions)
}

struct PrescriptionRow {
    id: String,
    appointment_id: String,
    user_id: String,
    doc_id: String,
    file_url: String,
    notes: Option<String>,
    created_at: String,
}

fn rx_row(row: &rusqlite::Row<'_>) -> Result<PrescriptionRow, rusqlite::Error> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        user_id: row.get(2)?,
        doc_id: row.get(3)?,
        file_url: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn rx_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: parse_uuid(&row.id)?,
        appointment_id: parse_uuid(&row.appointment_id)?,
        user_id: parse_uuid(&row.user_id)?,
        doc_id: parse_uuid(&row.doc_id)?,
        file_url: row.file_url,
        notes: row.notes,
        created_at: parse_ts(&row.created_at)?,
    })
}
