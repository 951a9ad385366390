//! Per-server access grants and the whitelist checks built on them.
//!
//! A player is whitelisted on a server when their account is verified and a
//! `server_access` row for that server has the rules accepted.

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{new_id, users, ServerAccess, StoreError, StoreResult, User};

const COLUMNS: &str = "id, user_id, server_id, rules_accepted, granted_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ServerAccess> {
    Ok(ServerAccess {
        id: row.get(0)?,
        user_id: row.get(1)?,
        server_id: row.get(2)?,
        rules_accepted: row.get(3)?,
        granted_at: row.get(4)?,
    })
}

/// Records that `user_id` accepted the rules of `server_id`.
pub fn accept_rules(conn: &Connection, user_id: &str, server_id: &str) -> StoreResult<ServerAccess> {
    conn.execute(
        "INSERT INTO server_access (id, user_id, server_id, rules_accepted, granted_at)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT (user_id, server_id) DO UPDATE SET rules_accepted = 1",
        params![new_id(), user_id, server_id, Utc::now()],
    )?;
    find(conn, user_id, server_id)?
        .ok_or_else(|| StoreError::NotFound(format!("access for {user_id} on {server_id}")))
}

pub fn find(conn: &Connection, user_id: &str, server_id: &str) -> StoreResult<Option<ServerAccess>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM server_access WHERE user_id = ?1 AND server_id = ?2"),
            params![user_id, server_id],
            from_row,
        )
        .optional()?)
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> StoreResult<Vec<ServerAccess>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM server_access WHERE user_id = ?1 ORDER BY granted_at"
    ))?;
    let rows = stmt
        .query_map(params![user_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The user behind `minecraft_name` if they are whitelisted on `server_id`.
pub fn whitelisted_user(
    conn: &Connection,
    minecraft_name: &str,
    server_id: &str,
) -> StoreResult<Option<User>> {
    let Some(user) = users::find_by_minecraft_name(conn, minecraft_name)? else {
        return Ok(None);
    };
    if !user.verified {
        return Ok(None);
    }
    let allowed = find(conn, &user.id, server_id)?.map_or(false, |access| access.rules_accepted);
    Ok(allowed.then_some(user))
}

/// Whitelisted players among `names`, paired with their display name
/// (real name when set, otherwise the Minecraft name).
pub fn whitelisted_names(
    conn: &Connection,
    server_id: &str,
    names: &[String],
) -> StoreResult<Vec<(String, String)>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT u.minecraft_name, COALESCE(u.real_name, u.minecraft_name)
         FROM users u
         JOIN server_access a ON a.user_id = u.id
         WHERE u.verified = 1 AND a.rules_accepted = 1 AND a.server_id = ?
           AND u.minecraft_name IN ({placeholders})"
    ))?;
    let params = std::iter::once(server_id).chain(names.iter().map(String::as_str));
    let rows = stmt
        .query_map(params_from_iter(params), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
