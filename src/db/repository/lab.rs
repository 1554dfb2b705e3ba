use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Lab;

const COLUMNS: &str = "id, name, email, image, address, city, phone, about, fees,
         available, created_at";

pub fn insert_lab(conn: &Connection, lab: &Lab) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO labs (id, name, email, image, address, city, phone, about, fees,
         available, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            lab.id.to_string(),
            lab.name,
            lab.email,
            lab.image,
            lab.address,
            lab.city,
            lab.phone,
            lab.about,
            lab.fees,
            lab.available as i32,
            lab.created_at.to_rfc3339(),
        ],
    )?;
    for service in &lab.services {
        conn.execute(
            "INSERT INTO lab_services (lab_id, name) VALUES (?1, ?2)",
            params![lab.id.to_string(), service],
        )?;
    }
    Ok(())
}

pub fn get_lab(conn: &Connection, id: &Uuid) -> Result<Option<Lab>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM labs WHERE id = ?1");
    let row = conn
        .query_row(&query, params![id.to_string()], lab_row)
        .optional()?;
    row.map(|r| lab_from_row(conn, r)).transpose()
}

/// All labs, newest first (admin view).
pub fn list_all(conn: &Connection) -> Result<Vec<Lab>, DatabaseError> {
    list(conn, false)
}

/// Available labs only, newest first (public view).
pub fn list_available(conn: &Connection) -> Result<Vec<Lab>, DatabaseError> {
    list(conn, true)
}

fn list(conn: &Connection, available_only: bool) -> Result<Vec<Lab>, DatabaseError> {
    let clause = if available_only {
        "WHERE available = 1"
    } else {
        ""
    };
    let query = format!("SELECT {COLUMNS} FROM labs {clause} ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| Ok(lab_row(row)))?;

    let mut labs = Vec::new();
    for row in rows {
        labs.push(lab_from_row(conn, row??)?);
    }
    Ok(labs)
}

pub fn set_available(conn: &Connection, id: &Uuid, available: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE labs SET available = ?2 WHERE id = ?1",
        params![id.to_string(), available as i32],
    )?;
    Ok(())
}

fn services_for(conn: &Connection, lab_id: &Uuid) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT name FROM lab_services WHERE lab_id = ?1")?;
    let rows = stmt.query_map(params![lab_id.to_string()], |row| row.get(0))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

struct LabRow {
    id: String,
    name: String,
    email: Option<String>,
    image: String,
    address: String,
    city: String,
    phone: String,
    about: String,
    fees: i64,
    available: i32,
    created_at: String,
}

fn lab_row(row: &rusqlite::Row<'_>) -> Result<LabRow, rusqlite::Error> {
    Ok(LabRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        address: row.get(4)?,
        city: row.get(5)?,
        phone: row.get(6)?,
        about: row.get(7)?,
        fees: row.get(8)?,
        available: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn lab_from_row(conn: &Connection, row: LabRow) -> Result<Lab, DatabaseError> {
    let id = parse_uuid(&row.id)?;
    let services = services_for(conn, &id)?;
    Ok(Lab {
        id,
        name: row.name,
        email: row.email,
        image: row.image,
        address: row.address,
        city: row.city,
        phone: row.phone,
        about: row.about,
        services,
        fees: row.fees,
        available: row.available != 0,
        created_at: parse_ts(&row.created_at)?,
    })
}
