//! Server catalogue with manual ordering.
//!
//! Listing order is `position`, then `name`. New servers are appended after
//! the current last position.

use access_policy::{AccessLevel, AppealPolicy};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use super::{NewServer, Server, ServerUpdate, StoreError, StoreResult};

const COLUMNS: &str = "id, name, description, ip, access_level, required_email_domain, contact, \
                       rules, appeal_policy, position";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Server> {
    let access_level: String = row.get(4)?;
    let rules: String = row.get(7)?;
    let appeal_policy: String = row.get(8)?;
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        ip: row.get(3)?,
        access_level: AccessLevel::parse_lenient(&access_level),
        required_email_domain: row.get(5)?,
        contact: row.get(6)?,
        // a corrupt rules column reads as no rules
        rules: serde_json::from_str(&rules).unwrap_or_default(),
        appeal_policy: AppealPolicy::parse_lenient(&appeal_policy),
        position: row.get(9)?,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn rules_json(rules: &[String]) -> StoreResult<String> {
    serde_json::to_string(rules).map_err(|e| StoreError::Invalid(e.to_string()))
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Server>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM servers ORDER BY position, name"
    ))?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<Option<Server>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM servers WHERE id = ?1"),
            params![id],
            from_row,
        )
        .optional()?)
}

/// Inserts a server at the end of the list. A taken id is a conflict.
pub fn create(conn: &Connection, new: &NewServer) -> StoreResult<Server> {
    let next_position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM servers",
        [],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO servers (id, name, description, ip, access_level, required_email_domain,
             contact, rules, appeal_policy, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            new.id.trim(),
            new.name,
            new.description,
            new.ip.trim(),
            new.access_level.as_str(),
            non_empty(new.required_email_domain.as_deref()),
            non_empty(new.contact.as_deref()),
            rules_json(&new.rules)?,
            new.appeal_policy.as_str(),
            next_position,
            Utc::now()
        ],
    )?;
    get(conn, new.id.trim())?.ok_or_else(|| StoreError::NotFound(format!("server {}", new.id)))
}

/// Applies a partial update. Returns `None` for an unknown server.
pub fn update(conn: &Connection, id: &str, changes: &ServerUpdate) -> StoreResult<Option<Server>> {
    let Some(mut server) = get(conn, id)? else {
        return Ok(None);
    };

    if let Some(name) = &changes.name {
        server.name = name.clone();
    }
    if let Some(description) = &changes.description {
        server.description = description.clone();
    }
    if let Some(ip) = &changes.ip {
        server.ip = ip.trim().to_string();
    }
    if let Some(level) = changes.access_level {
        server.access_level = level;
    }
    if let Some(domain) = &changes.required_email_domain {
        server.required_email_domain = non_empty(Some(domain));
    }
    if let Some(contact) = &changes.contact {
        server.contact = non_empty(Some(contact));
    }
    if let Some(rules) = &changes.rules {
        server.rules = rules.clone();
    }
    if let Some(policy) = changes.appeal_policy {
        server.appeal_policy = policy;
    }

    conn.execute(
        "UPDATE servers SET name = ?2, description = ?3, ip = ?4, access_level = ?5,
             required_email_domain = ?6, contact = ?7, rules = ?8, appeal_policy = ?9
         WHERE id = ?1",
        params![
            id,
            server.name,
            server.description,
            server.ip,
            server.access_level.as_str(),
            server.required_email_domain,
            server.contact,
            rules_json(&server.rules)?,
            server.appeal_policy.as_str()
        ],
    )?;
    Ok(Some(server))
}

/// Removes a server. Returns `false` when it did not exist.
pub fn delete(conn: &Connection, id: &str) -> StoreResult<bool> {
    Ok(conn.execute("DELETE FROM servers WHERE id = ?1", params![id])? > 0)
}

/// Moves the listed servers to the front in the given order.
///
/// Servers missing from `order` keep their relative order behind the listed
/// ones. Unknown or repeated ids reject the whole reorder.
pub fn reorder(conn: &mut Connection, order: &[String]) -> StoreResult<Vec<Server>> {
    let tx = conn.transaction()?;
    let current = list(&tx)?;
    let known: HashSet<&str> = current.iter().map(|s| s.id.as_str()).collect();

    let mut seen = HashSet::new();
    for id in order {
        if !known.contains(id.as_str()) {
            return Err(StoreError::Invalid(format!("Unknown server id: {id}")));
        }
        if !seen.insert(id.as_str()) {
            return Err(StoreError::Invalid(format!("Server id listed twice: {id}")));
        }
    }

    let remaining = current
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| !seen.contains(id));
    let final_order: Vec<&str> = order.iter().map(String::as_str).chain(remaining).collect();

    {
        let mut stmt = tx.prepare("UPDATE servers SET position = ?2 WHERE id = ?1")?;
        for (position, id) in final_order.iter().enumerate() {
            stmt.execute(params![id, position as i64])?;
        }
    }

    let reordered = list(&tx)?;
    tx.commit()?;
    Ok(reordered)
}

#[derive(Deserialize)]
struct SeedFile {
    servers: Vec<NewServer>,
}

/// Imports servers from a JSON file of the form `{"servers": [...]}` when the
/// table is empty. Returns how many servers were imported.
pub fn seed_if_empty(conn: &mut Connection, path: &Path) -> StoreResult<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM servers", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
    let seed: SeedFile = serde_json::from_str(&content)
        .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;

    let tx = conn.transaction()?;
    for server in &seed.servers {
        create(&tx, server)?;
    }
    tx.commit()?;

    info!("🌱 Imported {} servers from {}", seed.servers.len(), path.display());
    Ok(seed.servers.len())
}
