use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{new_id, EmailVerification, StoreResult};

const COLUMNS: &str = "id, email, code, expires_at, verified, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<EmailVerification> {
    Ok(EmailVerification {
        id: row.get(0)?,
        email: row.get(1)?,
        code: row.get(2)?,
        expires_at: row.get(3)?,
        verified: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn create(
    conn: &Connection,
    email: &str,
    code: &str,
    expires_at: DateTime<Utc>,
) -> StoreResult<EmailVerification> {
    let record = EmailVerification {
        id: new_id(),
        email: email.to_string(),
        code: code.to_string(),
        expires_at,
        verified: false,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO email_verifications (id, email, code, expires_at, verified, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![record.id, record.email, record.code, record.expires_at, record.created_at],
    )?;
    Ok(record)
}

/// Newest unverified record for `email` carrying `code`.
pub fn find_unverified(
    conn: &Connection,
    email: &str,
    code: &str,
) -> StoreResult<Option<EmailVerification>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM email_verifications
                 WHERE email = ?1 AND code = ?2 AND verified = 0
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            params![email, code],
            from_row,
        )
        .optional()?)
}

/// Newest verified record for `email`.
pub fn latest_verified(conn: &Connection, email: &str) -> StoreResult<Option<EmailVerification>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM email_verifications
                 WHERE email = ?1 AND verified = 1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            params![email],
            from_row,
        )
        .optional()?)
}

pub fn mark_verified(conn: &Connection, id: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE email_verifications SET verified = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Deletes unverified codes for `email`, optionally sparing one record.
pub fn purge_unverified(conn: &Connection, email: &str, keep: Option<&str>) -> StoreResult<usize> {
    let removed = conn.execute(
        "DELETE FROM email_verifications
         WHERE email = ?1 AND verified = 0 AND (?2 IS NULL OR id != ?2)",
        params![email, keep],
    )?;
    Ok(removed)
}
