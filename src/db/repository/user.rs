use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_json, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::User;

const COLUMNS: &str = "id, name, email, password_hash, otp, otp_expiry, is_verified,
         image, phone, address, dob, gender, created_at";

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, otp, otp_expiry, is_verified,
         image, phone, address, dob, gender, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            user.otp,
            user.otp_expiry.map(|t| t.to_rfc3339()),
            user.is_verified as i32,
            user.image,
            user.phone,
            user.address.to_string(),
            user.dob,
            user.gender,
            user.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM users WHERE email = ?1");
    let row = conn
        .query_row(&query, params![email], user_row)
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn get_user_by_id(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let query = format!("SELECT {COLUMNS} FROM users WHERE id = ?1");
    let row = conn
        .query_row(&query, params![id.to_string()], user_row)
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Store a fresh OTP challenge on the account.
pub fn set_otp(
    conn: &Connection,
    id: &Uuid,
    code: &str,
    expiry: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET otp = ?2, otp_expiry = ?3 WHERE id = ?1",
        params![id.to_string(), code, expiry.to_rfc3339()],
    )?;
    Ok(())
}

/// Consume the OTP. `mark_verified` additionally flips the verified flag
/// (registration flow).
pub fn clear_otp(conn: &Connection, id: &Uuid, mark_verified: bool) -> Result<(), DatabaseError> {
    if mark_verified {
        conn.execute(
            "UPDATE users SET otp = NULL, otp_expiry = NULL, is_verified = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
    } else {
        conn.execute(
            "UPDATE users SET otp = NULL, otp_expiry = NULL WHERE id = ?1",
            params![id.to_string()],
        )?;
    }
    Ok(())
}

/// Overwrite an unverified account with a repeated registration attempt.
pub fn update_unverified_registration(
    conn: &Connection,
    id: &Uuid,
    name: &str,
    password_hash: &str,
    otp: &str,
    otp_expiry: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET name = ?2, password_hash = ?3, otp = ?4, otp_expiry = ?5,
         is_verified = 0 WHERE id = ?1",
        params![
            id.to_string(),
            name,
            password_hash,
            otp,
            otp_expiry.to_rfc3339()
        ],
    )?;
    Ok(())
}

pub fn update_profile(
    conn: &Connection,
    id: &Uuid,
    name: &str,
    phone: &str,
    address: &serde_json::Value,
    dob: &str,
    gender: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET name = ?2, phone = ?3, address = ?4, dob = ?5, gender = ?6
         WHERE id = ?1",
        params![id.to_string(), name, phone, address.to_string(), dob, gender],
    )?;
    Ok(())
}

pub fn set_image(conn: &Connection, id: &Uuid, url: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET image = ?2 WHERE id = ?1",
        params![id.to_string(), url],
    )?;
    Ok(())
}

pub fn count_users(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

// Internal row type, mapped before parsing ids/timestamps.
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    otp: Option<String>,
    otp_expiry: Option<String>,
    is_verified: i32,
    image: String,
    phone: String,
    address: String,
    dob: String,
    gender: String,
    created_at: String,
}

fn user_row(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        otp: row.get(4)?,
        otp_expiry: row.get(5)?,
        is_verified: row.get(6)?,
        image: row.get(7)?,
        phone: row.get(8)?,
        address: row.get(9)?,
        dob: row.get(10)?,
        gender: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_uuid(&row.id)?,
        name: row.name,
        email: row.email,
        password_hash: row.password_hash,
        otp: row.otp,
        otp_expiry: row.otp_expiry.as_deref().map(parse_ts).transpose()?,
        is_verified: row.is_verified != 0,
        image: row.image,
        phone: row.phone,
        address: parse_json(&row.address),
        dob: row.dob,
        gender: row.gender,
        created_at: parse_ts(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn sample_user() -> User {
        User::new("Asha".into(), "asha@example.com".into(), "hash".into())
    }

    #[test]
    fn insert_and_fetch_by_email() {
        let conn = open_memory_database().unwrap();
        let user = sample_user();
        insert_user(&conn, &user).unwrap();

        let found = get_user_by_email(&conn, "asha@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(!found.is_verified);
        assert_eq!(get_user_by_email(&conn, "nobody@example.com").unwrap().map(|u| u.id), None);
    }

    #[test]
    fn duplicate_email_rejected() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &sample_user()).unwrap();
        let dup = User::new("Other".into(), "asha@example.com".into(), "h2".into());
        assert!(insert_user(&conn, &dup).is_err());
    }

    #[test]
    fn otp_set_and_clear() {
        let conn = open_memory_database().unwrap();
        let user = sample_user();
        insert_user(&conn, &user).unwrap();

        let expiry = Utc::now() + Duration::minutes(10);
        set_otp(&conn, &user.id, "654321", expiry).unwrap();
        let stored = get_user_by_id(&conn, &user.id).unwrap().unwrap();
        assert_eq!(stored.otp.as_deref(), Some("654321"));

        clear_otp(&conn, &user.id, true).unwrap();
        let stored = get_user_by_id(&conn, &user.id).unwrap().unwrap();
        assert!(stored.otp.is_none());
        assert!(stored.otp_expiry.is_none());
        assert!(stored.is_verified);
    }

    #[test]
    fn profile_update_persists() {
        let conn = open_memory_database().unwrap();
        let user = sample_user();
        insert_user(&conn, &user).unwrap();

        let address = serde_json::json!({"line1": "12 Main St", "line2": "Pune"});
        update_profile(&conn, &user.id, "Asha K", "9999999999", &address, "1990-04-01", "Female")
            .unwrap();

        let stored = get_user_by_id(&conn, &user.id).unwrap().unwrap();
        assert_eq!(stored.name, "Asha K");
        assert_eq!(stored.address["line1"], "12 Main St");
        assert_eq!(stored.dob, "1990-04-01");
    }
}
