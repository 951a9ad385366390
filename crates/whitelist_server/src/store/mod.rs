//! SQLite persistence.
//!
//! A single [`rusqlite::Connection`] guarded by a mutex. Repository functions
//! in the submodules are plain synchronous functions over `&Connection`; async
//! callers go through [`Store::call`], which runs them on Tokio's blocking pool.
//!
//! ```rust,no_run
//! # async fn demo(store: whitelist_server::store::Store) -> Result<(), whitelist_server::store::StoreError> {
//! use whitelist_server::store::servers;
//!
//! let listed = store.call(|conn| servers::list(conn)).await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod admins;
pub mod appeals;
pub mod models;
pub mod requests;
pub mod schema;
pub mod servers;
pub mod users;
pub mod verifications;

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use models::*;

/// Persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// A unique constraint rejected the write. Carries SQLite's message,
    /// e.g. `UNIQUE constraint failed: users.minecraft_name`.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Seed error: {0}")]
    Seed(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// True when the conflict concerns `table.column`.
    pub fn is_conflict_on(&self, column: &str) -> bool {
        matches!(self, StoreError::Conflict(message) if message.contains(column))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation
                    && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
            {
                StoreError::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "unique constraint failed".to_string()),
                )
            }
            _ => StoreError::Sqlite(error),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the portal database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        info!("🗄️ Opening database at {}", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Invalid(format!("{}: {e}", parent.display())))?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Private in-memory database, used by tests and `--database :memory:`.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Runs `f` on the calling thread. For startup tasks outside the runtime.
    pub fn call_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut guard = self.conn.lock();
        f(&mut guard)
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    schema::migrate(&conn).unwrap();
    conn
}
