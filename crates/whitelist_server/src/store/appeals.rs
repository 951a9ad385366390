use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{access, new_id, users, Appeal, AppealStatus, ServerAccess, StoreError, StoreResult};

const COLUMNS: &str = "id, server_id, user_email, minecraft_name, real_name, student_email, reason, \
                       status, reviewed_by, reviewed_at, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Appeal> {
    let status: String = row.get(7)?;
    Ok(Appeal {
        id: row.get(0)?,
        server_id: row.get(1)?,
        user_email: row.get(2)?,
        minecraft_name: row.get(3)?,
        real_name: row.get(4)?,
        student_email: row.get(5)?,
        reason: row.get(6)?,
        status: AppealStatus::parse(&status),
        reviewed_by: row.get(8)?,
        reviewed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewAppeal {
    pub server_id: String,
    pub user_email: String,
    pub minecraft_name: String,
    pub real_name: Option<String>,
    /// Set when the email passed a credential check
    pub student_email: Option<String>,
    pub reason: Option<String>,
}

pub fn create(conn: &Connection, new: &NewAppeal, status: AppealStatus) -> StoreResult<Appeal> {
    let id = new_id();
    conn.execute(
        "INSERT INTO appeals (id, server_id, user_email, minecraft_name, real_name, student_email,
             reason, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            new.server_id,
            new.user_email,
            new.minecraft_name,
            new.real_name,
            new.student_email,
            new.reason,
            status.as_str(),
            Utc::now()
        ],
    )?;
    find(conn, &id)?.ok_or_else(|| StoreError::NotFound(format!("appeal {id}")))
}

pub fn find(conn: &Connection, id: &str) -> StoreResult<Option<Appeal>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM appeals WHERE id = ?1"),
            params![id],
            from_row,
        )
        .optional()?)
}

/// Pending appeals, newest first.
pub fn list_pending(conn: &Connection) -> StoreResult<Vec<Appeal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appeals WHERE status = 'pending'
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// True when `email` has an approved appeal for `server_id`.
pub fn has_approved(conn: &Connection, server_id: &str, email: &str) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appeals WHERE server_id = ?1 AND user_email = ?2 AND status = 'approved'",
        params![server_id, email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Gives the appeal's player access to its server.
///
/// The applicant's email was verified before the appeal could be filed, so
/// the account is created or updated as verified, then the server's rules
/// are recorded as accepted.
fn grant(conn: &Connection, appeal: &Appeal) -> StoreResult<ServerAccess> {
    let user = users::upsert_verified(
        conn,
        &appeal.user_email,
        &appeal.minecraft_name,
        appeal.real_name.as_deref(),
        appeal.student_email.is_some(),
    )?;
    access::accept_rules(conn, &user.id, &appeal.server_id)
}

/// Stores an appeal that qualified on its own and grants access in one transaction.
pub fn create_approved(conn: &mut Connection, new: &NewAppeal) -> StoreResult<(Appeal, ServerAccess)> {
    let tx = conn.transaction()?;
    let appeal = create(&tx, new, AppealStatus::Approved)?;
    let access = grant(&tx, &appeal)?;
    tx.commit()?;
    Ok((appeal, access))
}

/// Records an admin decision on a pending appeal. Approval also grants access.
///
/// Returns `None` when no appeal has that id, and [`StoreError::Invalid`] when
/// the appeal was already decided, so a granted player can never end up with
/// a rejected appeal.
pub fn review(
    conn: &mut Connection,
    id: &str,
    status: AppealStatus,
    admin_id: &str,
) -> StoreResult<Option<Appeal>> {
    let tx = conn.transaction()?;
    let Some(current) = find(&tx, id)? else {
        return Ok(None);
    };
    if current.status != AppealStatus::Pending {
        return Err(StoreError::Invalid(format!(
            "Appeal already {}",
            current.status.as_str()
        )));
    }

    tx.execute(
        "UPDATE appeals SET status = ?2, reviewed_by = ?3, reviewed_at = ?4
         WHERE id = ?1 AND status = 'pending'",
        params![id, status.as_str(), admin_id, Utc::now()],
    )?;
    let appeal = find(&tx, id)?.ok_or_else(|| StoreError::NotFound(format!("appeal {id}")))?;
    if status == AppealStatus::Approved {
        grant(&tx, &appeal)?;
    }
    tx.commit()?;
    Ok(Some(appeal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::access::whitelisted_user;
    use crate::store::test_connection;
    use crate::store::users::{find_by_email, upsert_for_registration, Registration};

    fn new_appeal(email: &str, name: &str) -> NewAppeal {
        NewAppeal {
            server_id: "smp".to_string(),
            user_email: email.to_string(),
            minecraft_name: name.to_string(),
            real_name: Some("Alex".to_string()),
            student_email: None,
            reason: Some("Friend of a member".to_string()),
        }
    }

    #[test]
    fn pending_appeal_does_not_grant() {
        let conn = test_connection();
        let appeal = create(&conn, &new_appeal("alex@gmail.com", "Alex"), AppealStatus::Pending).unwrap();

        assert_eq!(list_pending(&conn).unwrap()[0].id, appeal.id);
        assert!(whitelisted_user(&conn, "Alex", "smp").unwrap().is_none());
        assert!(!has_approved(&conn, "smp", "alex@gmail.com").unwrap());
    }

    #[test]
    fn approval_whitelists_the_player() {
        let mut conn = test_connection();
        let appeal = create(&conn, &new_appeal("alex@gmail.com", "Alex"), AppealStatus::Pending).unwrap();

        let reviewed = review(&mut conn, &appeal.id, AppealStatus::Approved, "admin-1")
            .unwrap()
            .unwrap();
        assert_eq!(reviewed.status, AppealStatus::Approved);
        assert!(reviewed.reviewed_at.is_some());

        let user = whitelisted_user(&conn, "Alex", "smp").unwrap().unwrap();
        assert_eq!(user.email, "alex@gmail.com");
        assert!(user.verified);
        assert!(!user.is_student);
        assert!(list_pending(&conn).unwrap().is_empty());
        assert!(has_approved(&conn, "smp", "alex@gmail.com").unwrap());
    }

    #[test]
    fn rejection_does_not_grant() {
        let mut conn = test_connection();
        let appeal = create(&conn, &new_appeal("alex@gmail.com", "Alex"), AppealStatus::Pending).unwrap();

        review(&mut conn, &appeal.id, AppealStatus::Rejected, "admin-1").unwrap();
        assert!(find_by_email(&conn, "alex@gmail.com").unwrap().is_none());
    }

    #[test]
    fn decided_appeal_cannot_be_reviewed_again() {
        let mut conn = test_connection();
        let appeal = create(&conn, &new_appeal("alex@gmail.com", "Alex"), AppealStatus::Pending).unwrap();
        review(&mut conn, &appeal.id, AppealStatus::Approved, "admin-1").unwrap();

        let error = review(&mut conn, &appeal.id, AppealStatus::Rejected, "admin-2").unwrap_err();
        assert!(matches!(error, StoreError::Invalid(ref message) if message == "Appeal already approved"));

        let stored = find(&conn, &appeal.id).unwrap().unwrap();
        assert_eq!(stored.status, AppealStatus::Approved);
        assert_eq!(stored.reviewed_by.as_deref(), Some("admin-1"));
        assert!(whitelisted_user(&conn, "Alex", "smp").unwrap().is_some());
    }

    #[test]
    fn review_of_unknown_appeal() {
        let mut conn = test_connection();
        assert!(review(&mut conn, "missing", AppealStatus::Approved, "admin-1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn auto_approval_updates_existing_user() {
        let mut conn = test_connection();
        upsert_for_registration(
            &conn,
            &Registration {
                email: "alex@student.uu.se".to_string(),
                minecraft_name: "OldName".to_string(),
                real_name: None,
                credential: false,
                token: "t".to_string(),
            },
        )
        .unwrap();

        let mut new = new_appeal("alex@student.uu.se", "NewName");
        new.student_email = Some("alex@student.uu.se".to_string());
        let (appeal, access) = create_approved(&mut conn, &new).unwrap();

        assert_eq!(appeal.status, AppealStatus::Approved);
        assert!(access.rules_accepted);
        let user = whitelisted_user(&conn, "NewName", "smp").unwrap().unwrap();
        assert!(user.is_student);
    }

    #[test]
    fn grant_conflict_rolls_back_the_review() {
        let mut conn = test_connection();
        upsert_for_registration(
            &conn,
            &Registration {
                email: "owner@uu.se".to_string(),
                minecraft_name: "Alex".to_string(),
                real_name: None,
                credential: false,
                token: "t".to_string(),
            },
        )
        .unwrap();
        let appeal = create(&conn, &new_appeal("alex@gmail.com", "Alex"), AppealStatus::Pending).unwrap();

        let error = review(&mut conn, &appeal.id, AppealStatus::Approved, "admin-1").unwrap_err();
        assert!(error.is_conflict_on("users.minecraft_name"));
        assert_eq!(find(&conn, &appeal.id).unwrap().unwrap().status, AppealStatus::Pending);
    }
}
