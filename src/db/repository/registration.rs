use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{DoctorRegistration, RegistrationStatus};

const COLUMNS: &str = "id, name, email, phone, specialization, experience_years,
         clinic_address, status, created_at";

pub fn insert_registration(
    conn: &Connection,
    reg: &DoctorRegistration,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_registrations (id, name, email, phone, specialization,
         experience_years, clinic_address, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            reg.id.to_string(),
            reg.name,
            reg.email,
            reg.phone,
            reg.specialization,
            reg.experience_years,
            reg.clinic_address,
            reg.status.as_str(),
            reg.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_registration(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<DoctorRegistration>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM doctor_registrations WHERE id = ?1");
    let row = conn
        .query_row(&query, params![id.to_string()], reg_row)
        .optional()?;
    row.map(reg_from_row).transpose()
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctor_registrations WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_registrations(conn: &Connection) -> Result<Vec<DoctorRegistration>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM doctor_registrations ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| Ok(reg_row(row)))?;

    let mut regs = Vec::new();
    for row in rows {
        regs.push(reg_from_row(row??)?);
    }
    Ok(regs)
}

pub fn set_status(
    conn: &Connection,
    id: &Uuid,
    status: RegistrationStatus,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE doctor_registrations SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    Ok(())
}

struct RegistrationRow {
    id: String,
    name: String,
    email: String,
    phone: String,
    specialization: String,
    experience_years: i64,
    clinic_address: String,
    status: String,
    created_at: String,
}

fn reg_row(row: &rusqlite::Row<'_>) -> Result<RegistrationRow, rusqlite::Error> {
    Ok(RegistrationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        specialization: row.get(4)?,
        experience_years: row.get(5)?,
        clinic_address: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn reg_from_row(row: RegistrationRow) -> Result<DoctorRegistration, DatabaseError> {
    Ok(DoctorRegistration {
        id: parse_uuid(&row.id)?,
        name: row.name,
        email: row.email,
        phone: row.phone,
        specialization: row.specialization,
        experience_years: row.experience_years,
        clinic_address: row.clinic_address,
        status: RegistrationStatus::from_str(&row.status)?,
        created_at: parse_ts(&row.created_at)?,
    })
}
