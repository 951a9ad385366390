//! Upgrade requests: a user asks for a higher access level, confirms the
//! email by magic link, and waits for an admin.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{new_id, users, AccessRequest, PendingAccessRequest, StoreError, StoreResult, UserSummary};

const COLUMNS: &str = "id, user_id, requested_level, email, real_name, note, verification_token, \
                       verified, approved, rejected, reviewed_by, reviewed_at, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<AccessRequest> {
    Ok(AccessRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        requested_level: row.get(2)?,
        email: row.get(3)?,
        real_name: row.get(4)?,
        note: row.get(5)?,
        verification_token: row.get(6)?,
        verified: row.get(7)?,
        approved: row.get(8)?,
        rejected: row.get(9)?,
        reviewed_by: row.get(10)?,
        reviewed_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewAccessRequest {
    pub user_id: String,
    pub requested_level: String,
    pub email: String,
    pub real_name: String,
    pub note: Option<String>,
    pub token: String,
}

pub fn create(conn: &Connection, new: &NewAccessRequest) -> StoreResult<AccessRequest> {
    let id = new_id();
    conn.execute(
        "INSERT INTO access_requests (id, user_id, requested_level, email, real_name, note,
             verification_token, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.user_id,
            new.requested_level,
            new.email,
            new.real_name,
            new.note,
            new.token,
            Utc::now()
        ],
    )?;
    find(conn, &id)?.ok_or_else(|| StoreError::NotFound(format!("access request {id}")))
}

pub fn find(conn: &Connection, id: &str) -> StoreResult<Option<AccessRequest>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM access_requests WHERE id = ?1"),
            params![id],
            from_row,
        )
        .optional()?)
}

/// Confirms the request carrying `token` and consumes the token.
pub fn verify_by_token(conn: &Connection, token: &str) -> StoreResult<Option<AccessRequest>> {
    if token.is_empty() {
        return Ok(None);
    }
    let found = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM access_requests WHERE verification_token = ?1"),
            params![token],
            from_row,
        )
        .optional()?;
    let Some(request) = found else {
        return Ok(None);
    };
    conn.execute(
        "UPDATE access_requests SET verified = 1, verification_token = NULL WHERE id = ?1",
        params![request.id],
    )?;
    find(conn, &request.id)
}

/// Verified requests not yet reviewed, newest first.
pub fn list_pending(conn: &Connection) -> StoreResult<Vec<PendingAccessRequest>> {
    let columns = COLUMNS
        .split(", ")
        .map(|column| format!("r.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns}, u.minecraft_name, u.email
         FROM access_requests r JOIN users u ON u.id = r.user_id
         WHERE r.verified = 1 AND r.approved = 0 AND r.rejected = 0
         ORDER BY r.created_at DESC, r.rowid DESC"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PendingAccessRequest {
                request: from_row(row)?,
                user: UserSummary {
                    minecraft_name: row.get(13)?,
                    email: row.get(14)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The user's most recent requests.
pub fn list_for_user(conn: &Connection, user_id: &str, limit: usize) -> StoreResult<Vec<AccessRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM access_requests WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![user_id, limit as i64], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Approves a verified request and applies it to the user.
///
/// The user's credential flag becomes `requested_level == "student"` and the
/// real name is taken from the request.
pub fn approve(conn: &mut Connection, id: &str, admin_id: &str) -> StoreResult<AccessRequest> {
    let tx = conn.transaction()?;
    let request = match find(&tx, id)? {
        Some(request) if request.verified => request,
        _ => return Err(StoreError::Invalid("Invalid or unverified request".to_string())),
    };

    users::apply_upgrade(
        &tx,
        &request.user_id,
        request.requested_level == "student",
        &request.real_name,
    )?;
    tx.execute(
        "UPDATE access_requests SET approved = 1, reviewed_by = ?2, reviewed_at = ?3 WHERE id = ?1",
        params![id, admin_id, Utc::now()],
    )?;
    let approved = find(&tx, id)?.ok_or_else(|| StoreError::NotFound(format!("access request {id}")))?;
    tx.commit()?;
    Ok(approved)
}

pub fn reject(conn: &Connection, id: &str, admin_id: &str) -> StoreResult<Option<AccessRequest>> {
    let updated = conn.execute(
        "UPDATE access_requests SET rejected = 1, reviewed_by = ?2, reviewed_at = ?3 WHERE id = ?1",
        params![id, admin_id, Utc::now()],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    find(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_connection;
    use crate::store::users::{create_for_login, find_by_id};

    fn request(conn: &Connection, user_id: &str, token: &str) -> AccessRequest {
        create(
            conn,
            &NewAccessRequest {
                user_id: user_id.to_string(),
                requested_level: "student".to_string(),
                email: "alex@student.uu.se".to_string(),
                real_name: "Alex Andersson".to_string(),
                note: Some("I study here".to_string()),
                token: token.to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn verification_moves_request_to_pending_list() {
        let conn = test_connection();
        let user = create_for_login(&conn, "alex@gmail.com", false, "login").unwrap();
        let created = request(&conn, &user.id, "upgrade-token");

        assert!(list_pending(&conn).unwrap().is_empty());
        let verified = verify_by_token(&conn, "upgrade-token").unwrap().unwrap();
        assert!(verified.verified);
        assert!(verify_by_token(&conn, "upgrade-token").unwrap().is_none());

        let pending = list_pending(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request.id, created.id);
        assert_eq!(pending[0].user.email, "alex@gmail.com");
    }

    #[test]
    fn approval_requires_verification_and_updates_user() {
        let mut conn = test_connection();
        let user = create_for_login(&conn, "alex@gmail.com", false, "login").unwrap();
        let created = request(&conn, &user.id, "upgrade-token");

        let error = approve(&mut conn, &created.id, "admin-1").unwrap_err();
        assert!(matches!(error, StoreError::Invalid(_)));

        verify_by_token(&conn, "upgrade-token").unwrap();
        let approved = approve(&mut conn, &created.id, "admin-1").unwrap();
        assert!(approved.approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some("admin-1"));

        let user = find_by_id(&conn, &user.id).unwrap().unwrap();
        assert!(user.is_student);
        assert_eq!(user.real_name.as_deref(), Some("Alex Andersson"));
        assert!(list_pending(&conn).unwrap().is_empty());
    }

    #[test]
    fn reject_unknown_request() {
        let conn = test_connection();
        assert!(reject(&conn, "missing", "admin-1").unwrap().is_none());
    }

    #[test]
    fn recent_requests_are_limited() {
        let conn = test_connection();
        let user = create_for_login(&conn, "alex@gmail.com", false, "login").unwrap();
        for i in 0..12 {
            request(&conn, &user.id, &format!("token-{i}"));
        }
        assert_eq!(list_for_user(&conn, &user.id, 10).unwrap().len(), 10);
    }
}
