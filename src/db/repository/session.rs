//! Bearer sessions. Tokens are stored hashed; lookups are by hash only.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::repository::parse_ts;
use crate::db::DatabaseError;
use crate::models::Role;

pub struct Session {
    pub account_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    account_id: &str,
    role: Role,
    expires_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO sessions (token_hash, account_id, role, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![token_hash, account_id, role.as_str(), expires_at.to_rfc3339()],
    )?;
    Ok(())
}

/// Resolve a token hash to a live session. Expired sessions resolve to `None`.
pub fn find_valid(
    conn: &Connection,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT account_id, role, expires_at FROM sessions WHERE token_hash = ?1",
            params![token_hash],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((account_id, role, expires_at)) = row else {
        return Ok(None);
    };
    let expires_at = parse_ts(&expires_at)?;
    if expires_at < now {
        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
        return Ok(None);
    }
    Ok(Some(Session {
        account_id,
        role: Role::from_str(&role)?,
        expires_at,
    }))
}

pub fn delete_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE expires_at < ?1",
        params![now.to_rfc3339()],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    #[test]
    fn valid_session_resolves() {
        let conn = open_memory_database().unwrap();
        insert_session(&conn, "hash-1", "acct-1", Role::User, Utc::now() + Duration::days(7))
            .unwrap();

        let session = find_valid(&conn, "hash-1", Utc::now()).unwrap().unwrap();
        assert_eq!(session.account_id, "acct-1");
        assert_eq!(session.role, Role::User);
    }

    #[test]
    fn expired_session_rejected_and_removed() {
        let conn = open_memory_database().unwrap();
        insert_session(&conn, "hash-2", "acct-2", Role::Doctor, Utc::now() - Duration::hours(1))
            .unwrap();

        assert!(find_valid(&conn, "hash-2", Utc::now()).unwrap().is_none());
        // Row was cleaned up on the failed lookup
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn unknown_hash_resolves_to_none() {
        let conn = open_memory_database().unwrap();
        assert!(find_valid(&conn, "missing", Utc::now()).unwrap().is_none());
    }
}
