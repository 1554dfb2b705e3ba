use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_json, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Doctor, DoctorService};

const COLUMNS: &str = "id, name, email, password_hash, image, speciality, degree,
         experience, about, available, fees, phone, address, created_at";

pub fn insert_doctor(conn: &Connection, doc: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, email, password_hash, image, speciality, degree,
         experience, about, available, fees, phone, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            doc.id.to_string(),
            doc.name,
            doc.email,
            doc.password_hash,
            doc.image,
            doc.speciality,
            doc.degree,
            doc.experience,
            doc.about,
            doc.available as i32,
            doc.fees,
            doc.phone,
            doc.address.to_string(),
            doc.created_at.to_rfc3339(),
        ],
    )?;
    replace_services(conn, &doc.id, &doc.services)?;
    Ok(())
}

pub fn get_doctor_by_id(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM doctors WHERE id = ?1");
    let row = conn
        .query_row(&query, params![id.to_string()], doctor_row)
        .optional()?;
    row.map(|r| doctor_from_row(conn, r)).transpose()
}

pub fn get_doctor_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Doctor>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM doctors WHERE email = ?1");
    let row = conn
        .query_row(&query, params![email], doctor_row)
        .optional()?;
    row.map(|r| doctor_from_row(conn, r)).transpose()
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM doctors ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| Ok(doctor_row(row)))?;

    let mut doctors = Vec::new();
    for row in rows {
        doctors.push(doctor_from_row(conn, row??)?);
    }
    Ok(doctors)
}

pub fn set_available(conn: &Connection, id: &Uuid, available: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE doctors SET available = ?2 WHERE id = ?1",
        params![id.to_string(), available as i32],
    )?;
    Ok(())
}

/// Profile fields a doctor may edit from the panel.
pub fn update_profile(
    conn: &Connection,
    id: &Uuid,
    fees: i64,
    address: &serde_json::Value,
    available: bool,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE doctors SET fees = ?2, address = ?3, available = ?4 WHERE id = ?1",
        params![id.to_string(), fees, address.to_string(), available as i32],
    )?;
    Ok(())
}

pub fn replace_services(
    conn: &Connection,
    doctor_id: &Uuid,
    services: &[DoctorService],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM doctor_services WHERE doctor_id = ?1",
        params![doctor_id.to_string()],
    )?;
    for service in services {
        conn.execute(
            "INSERT INTO doctor_services (doctor_id, name, description, fee, duration_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doctor_id.to_string(),
                service.name,
                service.description,
                service.fee,
                service.duration_minutes,
            ],
        )?;
    }
    Ok(())
}

pub fn services_for(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<DoctorService>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, description, fee, duration_minutes
         FROM doctor_services WHERE doctor_id = ?1",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| {
        Ok(DoctorService {
            name: row.get(0)?,
            description: row.get(1)?,
            fee: row.get(2)?,
            duration_minutes: row.get(3)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn count_doctors(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))?)
}

struct DoctorRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    image: String,
    speciality: String,
    degree: String,
    experience: String,
    about: String,
    available: i32,
    fees: i64,
    phone: String,
    address: String,
    created_at: String,
}

fn doctor_row(row: &rusqlite::Row<'_>) -> Result<DoctorRow, rusqlite::Error> {
    Ok(DoctorRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        speciality: row.get(5)?,
        degree: row.get(6)?,
        experience: row.get(7)?,
        about: row.get(8)?,
        available: row.get(9)?,
        fees: row.get(10)?,
        phone: row.get(11)?,
        address: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn doctor_from_row(conn: &Connection, row: DoctorRow) -> Result<Doctor, DatabaseError> {
    let id = parse_uuid(&row.id)?;
    let services = services_for(conn, &id)?;
    Ok(Doctor {
        id,
        name: row.name,
        email: row.email,
        password_hash: row.password_hash,
        image: row.image,
        speciality: row.speciality,
        degree: row.degree,
        experience: row.experience,
        about: row.about,
        available: row.available != 0,
        fees: row.fees,
        phone: row.phone,
        address: parse_json(&row.address),
        services,
        created_at: parse_ts(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn sample_doctor() -> Doctor {
        let mut doc = Doctor::new(
            "Dr. Rao".into(),
            "rao@example.com".into(),
            "hash".into(),
            "Dermatology".into(),
            500,
        );
        doc.services = vec![DoctorService {
            name: "Skin consult".into(),
            description: Some("30 minute consultation".into()),
            fee: Some(500),
            duration_minutes: Some(30),
        }];
        doc
    }

    #[test]
    fn insert_and_fetch_with_services() {
        let conn = open_memory_database().unwrap();
        let doc = sample_doctor();
        insert_doctor(&conn, &doc).unwrap();

        let stored = get_doctor_by_id(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(stored.speciality, "Dermatology");
        assert_eq!(stored.services.len(), 1);
        assert_eq!(stored.services[0].name, "Skin consult");
    }

    #[test]
    fn availability_toggle() {
        let conn = open_memory_database().unwrap();
        let doc = sample_doctor();
        insert_doctor(&conn, &doc).unwrap();

        set_available(&conn, &doc.id, false).unwrap();
        assert!(!get_doctor_by_id(&conn, &doc.id).unwrap().unwrap().available);
        set_available(&conn, &doc.id, true).unwrap();
        assert!(get_doctor_by_id(&conn, &doc.id).unwrap().unwrap().available);
    }

    #[test]
    fn replace_services_overwrites() {
        let conn = open_memory_database().unwrap();
        let doc = sample_doctor();
        insert_doctor(&conn, &doc).unwrap();

        let new_services = vec![
            DoctorService {
                name: "Acne follow-up".into(),
                description: None,
                fee: Some(300),
                duration_minutes: None,
            },
            DoctorService {
                name: "Biopsy".into(),
                description: None,
                fee: Some(1500),
                duration_minutes: Some(45),
            },
        ];
        replace_services(&conn, &doc.id, &new_services).unwrap();

        let stored = services_for(&conn, &doc.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].name, "Biopsy");
    }
}
