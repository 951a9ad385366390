use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{new_id, StoreError, StoreResult, User};

pub(crate) const COLUMNS: &str = "id, email, minecraft_name, real_name, is_student, verified, \
                                   verification_token, created_at, updated_at";

pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        minecraft_name: row.get(2)?,
        real_name: row.get(3)?,
        is_student: row.get(4)?,
        verified: row.get(5)?,
        verification_token: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn find_where(conn: &Connection, clause: &str, value: &str) -> StoreResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE {clause} = ?1"),
            params![value],
            from_row,
        )
        .optional()?)
}

pub fn find_by_id(conn: &Connection, id: &str) -> StoreResult<Option<User>> {
    find_where(conn, "id", id)
}

pub fn find_by_email(conn: &Connection, email: &str) -> StoreResult<Option<User>> {
    find_where(conn, "email", email)
}

pub fn find_by_token(conn: &Connection, token: &str) -> StoreResult<Option<User>> {
    if token.is_empty() {
        return Ok(None);
    }
    find_where(conn, "verification_token", token)
}

pub fn find_by_minecraft_name(conn: &Connection, name: &str) -> StoreResult<Option<User>> {
    find_where(conn, "minecraft_name", name)
}

/// Verified users among `names`.
pub fn find_verified_by_minecraft_names(
    conn: &Connection,
    names: &[String],
) -> StoreResult<Vec<User>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users WHERE verified = 1 AND minecraft_name IN ({placeholders})"
    ))?;
    let users = stmt
        .query_map(params_from_iter(names.iter()), from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Data submitted through the registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub minecraft_name: String,
    pub real_name: Option<String>,
    /// The email passed a credential check on the target server
    pub credential: bool,
    pub token: String,
}

/// Creates the user or refreshes an existing one for a new verification round.
///
/// An existing user keeps a previously stored real name when none is given,
/// and never loses a credential. Verification is reset until the new magic
/// link is followed.
pub fn upsert_for_registration(conn: &Connection, registration: &Registration) -> StoreResult<User> {
    let now = Utc::now();
    let real_name = registration
        .real_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let id = match find_by_email(conn, &registration.email)? {
        Some(existing) => {
            conn.execute(
                "UPDATE users SET minecraft_name = ?2, real_name = COALESCE(?3, real_name),
                     is_student = (is_student OR ?4), verification_token = ?5, verified = 0,
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    existing.id,
                    registration.minecraft_name,
                    real_name,
                    registration.credential,
                    registration.token,
                    now
                ],
            )?;
            existing.id
        }
        None => {
            let id = new_id();
            conn.execute(
                "INSERT INTO users (id, email, minecraft_name, real_name, is_student, verified,
                     verification_token, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)",
                params![
                    id,
                    registration.email,
                    registration.minecraft_name,
                    real_name,
                    registration.credential,
                    registration.token,
                    now
                ],
            )?;
            id
        }
    };

    require(conn, &id)
}

/// Creates a user from an email login. The Minecraft name is set later.
pub fn create_for_login(
    conn: &Connection,
    email: &str,
    credential: bool,
    token: &str,
) -> StoreResult<User> {
    let id = new_id();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (id, email, is_student, verified, verification_token, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)",
        params![id, email, credential, token, now],
    )?;
    require(conn, &id)
}

/// Creates or updates a user whose email was verified out of band (OTP),
/// as happens when an appeal is approved.
pub fn upsert_verified(
    conn: &Connection,
    email: &str,
    minecraft_name: &str,
    real_name: Option<&str>,
    credential: bool,
) -> StoreResult<User> {
    let now = Utc::now();
    let id = match find_by_email(conn, email)? {
        Some(existing) => {
            conn.execute(
                "UPDATE users SET minecraft_name = ?2, real_name = COALESCE(?3, real_name),
                     is_student = (is_student OR ?4), verified = 1, updated_at = ?5
                 WHERE id = ?1",
                params![existing.id, minecraft_name, real_name, credential, now],
            )?;
            existing.id
        }
        None => {
            let id = new_id();
            conn.execute(
                "INSERT INTO users (id, email, minecraft_name, real_name, is_student, verified,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                params![id, email, minecraft_name, real_name, credential, now],
            )?;
            id
        }
    };
    require(conn, &id)
}

/// Marks the user verified and consumes the token.
pub fn mark_verified(conn: &Connection, id: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET verified = 1, verification_token = NULL, updated_at = ?2 WHERE id = ?1",
        params![id, Utc::now()],
    )?;
    Ok(())
}

pub fn set_token(conn: &Connection, id: &str, token: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET verification_token = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, token, Utc::now()],
    )?;
    Ok(())
}

/// Applies the fields that are `Some`. Returns `None` for an unknown user.
pub fn update_profile(
    conn: &Connection,
    id: &str,
    real_name: Option<&str>,
    minecraft_name: Option<&str>,
) -> StoreResult<Option<User>> {
    if find_by_id(conn, id)?.is_none() {
        return Ok(None);
    }
    let now = Utc::now();
    if let Some(real_name) = real_name {
        let real_name = Some(real_name.trim()).filter(|n| !n.is_empty());
        conn.execute(
            "UPDATE users SET real_name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, real_name, now],
        )?;
    }
    if let Some(minecraft_name) = minecraft_name {
        let minecraft_name = minecraft_name.trim();
        if minecraft_name.is_empty() {
            return Err(StoreError::Invalid("Minecraft name cannot be empty".to_string()));
        }
        conn.execute(
            "UPDATE users SET minecraft_name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, minecraft_name, now],
        )?;
    }
    find_by_id(conn, id)
}

/// Sets the credential flag and real name after an approved upgrade.
pub fn apply_upgrade(conn: &Connection, id: &str, credential: bool, real_name: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET is_student = ?2, real_name = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, credential, real_name, Utc::now()],
    )?;
    Ok(())
}

fn require(conn: &Connection, id: &str) -> StoreResult<User> {
    find_by_id(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("user {id}")))
}
