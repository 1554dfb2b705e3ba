use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::repository::parse_ts;
use crate::db::DatabaseError;
use crate::models::PhoneOtp;

/// Store a fresh code for the phone, replacing any previous codes.
pub fn replace_code(conn: &Connection, otp: &PhoneOtp) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM otp_codes WHERE phone = ?1", params![otp.phone])?;
    conn.execute(
        "INSERT INTO otp_codes (phone, code, expires_at, verified) VALUES (?1, ?2, ?3, ?4)",
        params![
            otp.phone,
            otp.code,
            otp.expires_at.to_rfc3339(),
            otp.verified as i32
        ],
    )?;
    Ok(())
}

/// Look up an unconsumed code matching phone + code exactly.
pub fn find_pending(
    conn: &Connection,
    phone: &str,
    code: &str,
) -> Result<Option<PhoneOtp>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT phone, code, expires_at, verified FROM otp_codes
             WHERE phone = ?1 AND code = ?2 AND verified = 0",
            params![phone, code],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(phone, code, expires_at, verified)| {
        Ok(PhoneOtp {
            phone,
            code,
            expires_at: parse_ts(&expires_at)?,
            verified: verified != 0,
        })
    })
    .transpose()
}

/// Consume the code (single use).
pub fn mark_verified(conn: &Connection, phone: &str, code: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE otp_codes SET verified = 1 WHERE phone = ?1 AND code = ?2",
        params![phone, code],
    )?;
    Ok(())
}

/// Drop codes whose expiry has passed (periodic cleanup).
pub fn delete_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM otp_codes WHERE expires_at < ?1",
        params![now.to_rfc3339()],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn fresh(phone: &str, code: &str) -> PhoneOtp {
        PhoneOtp::new(phone.into(), code.into(), Utc::now() + Duration::minutes(5))
    }

    #[test]
    fn replace_discards_previous_code() {
        let conn = open_memory_database().unwrap();
        replace_code(&conn, &fresh("+911111111111", "111111")).unwrap();
        replace_code(&conn, &fresh("+911111111111", "222222")).unwrap();

        assert!(find_pending(&conn, "+911111111111", "111111").unwrap().is_none());
        assert!(find_pending(&conn, "+911111111111", "222222").unwrap().is_some());
    }

    #[test]
    fn verified_code_not_found_again() {
        let conn = open_memory_database().unwrap();
        replace_code(&conn, &fresh("+911111111111", "333333")).unwrap();

        mark_verified(&conn, "+911111111111", "333333").unwrap();
        assert!(find_pending(&conn, "+911111111111", "333333").unwrap().is_none());
    }

    #[test]
    fn expired_cleanup() {
        let conn = open_memory_database().unwrap();
        let stale = PhoneOtp::new(
            "+912222222222".into(),
            "444444".into(),
            Utc::now() - Duration::minutes(1),
        );
        replace_code(&conn, &stale).unwrap();

        let deleted = delete_expired(&conn, Utc::now()).unwrap();
        assert_eq!(deleted, 1);
    }
}
