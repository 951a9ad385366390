use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{new_id, Admin, StoreResult};

const COLUMNS: &str = "id, username, email, password_hash, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Inserts an admin. `password_hash` must already be a bcrypt hash.
pub fn create(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
) -> StoreResult<Admin> {
    let admin = Admin {
        id: new_id(),
        username: username.trim().to_string(),
        email: email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty()),
        password_hash: password_hash.to_string(),
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO admins (id, username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![admin.id, admin.username, admin.email, admin.password_hash, admin.created_at],
    )?;
    Ok(admin)
}

/// Finds an admin by username, or by email when the identifier contains `@`.
pub fn find_by_identifier(conn: &Connection, identifier: &str) -> StoreResult<Option<Admin>> {
    let identifier = identifier.trim();
    let admin = if identifier.contains('@') {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM admins WHERE email = ?1"),
            params![identifier.to_lowercase()],
            from_row,
        )
        .optional()?
    } else {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM admins WHERE username = ?1"),
            params![identifier],
            from_row,
        )
        .optional()?
    };
    Ok(admin)
}

/// Emails of every admin that has one, for review notifications.
pub fn notification_emails(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT email FROM admins WHERE email IS NOT NULL AND email != ''")?;
    let emails = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(emails)
}
