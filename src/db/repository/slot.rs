//! Doctor slot reservations.
//!
//! A reservation is one row in `doctor_slots`; the UNIQUE constraint on
//! (doctor_id, slot_date, slot_time) makes `try_reserve` an atomic
//! conditional insert, so two competing bookings for the same slot cannot
//! both succeed even across separate connections.

use std::collections::HashMap;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;

/// Reserve a slot if it is still free. Returns `true` when this call took
/// the slot, `false` when it was already booked.
pub fn try_reserve(
    conn: &Connection,
    doctor_id: &Uuid,
    slot_date: &str,
    slot_time: &str,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO doctor_slots (doctor_id, slot_date, slot_time)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (doctor_id, slot_date, slot_time) DO NOTHING",
        params![doctor_id.to_string(), slot_date, slot_time],
    )?;
    Ok(inserted == 1)
}

/// Free a previously reserved slot (appointment cancellation).
pub fn release(
    conn: &Connection,
    doctor_id: &Uuid,
    slot_date: &str,
    slot_time: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM doctor_slots WHERE doctor_id = ?1 AND slot_date = ?2 AND slot_time = ?3",
        params![doctor_id.to_string(), slot_date, slot_time],
    )?;
    Ok(())
}

pub fn is_booked(
    conn: &Connection,
    doctor_id: &Uuid,
    slot_date: &str,
    slot_time: &str,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctor_slots
         WHERE doctor_id = ?1 AND slot_date = ?2 AND slot_time = ?3",
        params![doctor_id.to_string(), slot_date, slot_time],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// The per-doctor date → booked-times view served to clients.
pub fn slots_booked(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<HashMap<String, Vec<String>>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT slot_date, slot_time FROM doctor_slots
         WHERE doctor_id = ?1 ORDER BY slot_date, slot_time",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (date, time) = row?;
        map.entry(date).or_default().push(time);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::db::repository::doctor::insert_doctor;
    use crate::models::Doctor;

    fn seed_doctor(conn: &Connection) -> Uuid {
        let doc = Doctor::new(
            "Dr. Rao".into(),
            "rao@example.com".into(),
            "hash".into(),
            "Dermatology".into(),
            500,
        );
        insert_doctor(conn, &doc).unwrap();
        doc.id
    }

    #[test]
    fn reserve_then_query_then_release() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed_doctor(&conn);

        assert!(try_reserve(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap());
        assert!(is_booked(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap());

        let map = slots_booked(&conn, &doc_id).unwrap();
        assert_eq!(map["2026-09-01"], vec!["10:30 AM"]);

        release(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap();
        assert!(!is_booked(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap());
        assert!(slots_booked(&conn, &doc_id).unwrap().is_empty());
    }

    #[test]
    fn second_reservation_loses() {
        let conn = open_memory_database().unwrap();
        let doc_id = seed_doctor(&conn);

        assert!(try_reserve(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap());
        assert!(!try_reserve(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap());
    }

    #[test]
    fn same_time_different_date_or_doctor_is_free() {
        let conn = open_memory_database().unwrap();
        let doc_a = seed_doctor(&conn);
        let doc_b = {
            let doc = Doctor::new(
                "Dr. Iyer".into(),
                "iyer@example.com".into(),
                "hash".into(),
                "Cardiology".into(),
                900,
            );
            insert_doctor(&conn, &doc).unwrap();
            doc.id
        };

        assert!(try_reserve(&conn, &doc_a, "2026-09-01", "10:30 AM").unwrap());
        assert!(try_reserve(&conn, &doc_a, "2026-09-02", "10:30 AM").unwrap());
        assert!(try_reserve(&conn, &doc_b, "2026-09-01", "10:30 AM").unwrap());
    }

    /// Two connections racing for the same slot: exactly one wins.
    /// Uses a file-backed database so each thread gets its own connection.
    #[test]
    fn concurrent_reservations_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("race.db");
        let doc_id = {
            let conn = open_database(&db_path).unwrap();
            seed_doctor(&conn)
        };

        let mut handles = Vec::new();
        for _ in 0..4 {
            let path = db_path.clone();
            handles.push(std::thread::spawn(move || {
                let conn = open_database(&path).unwrap();
                try_reserve(&conn, &doc_id, "2026-09-01", "10:30 AM").unwrap()
            }));
        }

        let results: Vec<bool> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        assert_eq!(results.iter().filter(|&&won| won).count(), 1);
    }
}
