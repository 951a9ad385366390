//! # Whitelist Server
//!
//! HTTP backend of the Minecraft whitelist portal. Players register an email
//! and a Minecraft name, prove they own the email, and are whitelisted on the
//! servers whose access policy they satisfy. Admins review what the policy
//! sends for review and manage the server list.
//!
//! ## Components
//!
//! * [`routes`] - The axum router and every JSON endpoint
//! * [`store`] - SQLite persistence through rusqlite, one repository module per table
//! * [`membership`] - The membership list read from a CSV export
//! * [`mail`] - SMTP delivery (lettre) or a logging stand-in, plus message templates
//! * [`auth`] - Admin JWTs, password hashing and one-time secrets
//! * [`server`] - Startup, background status polling and graceful shutdown
//!
//! Access decisions are made by the [`access_policy`] crate; live server
//! status comes from [`server_status`].
//!
//! ## Request Flow
//!
//! 1. A handler extracts [`AppState`] and, for admin routes, an [`auth::AdminSession`]
//! 2. Store calls run on the blocking pool through [`store::Store::call`]
//! 3. Failures become [`PortalError`], rendered as `{"error": "..."}`

pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod membership;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

pub use config::PortalConfig;
pub use error::PortalError;
pub use server::PortalServer;
pub use state::AppState;

use store::{admins, Admin, Store};

/// Creates an admin account with a freshly hashed password.
///
/// # Arguments
///
/// * `store` - Open database
/// * `username` - Login name, must be unique
/// * `email` - Receives appeal notifications when set
/// * `password` - Plain-text password, hashed with bcrypt before storage
pub fn create_admin(
    store: &Store,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<Admin, PortalError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(PortalError::bad_request("Username and password are required"));
    }
    let hash = auth::hash_password(password)?;
    let email = email
        .map(access_policy::email::normalize)
        .filter(|email| !email.is_empty());

    let admin = store
        .call_blocking(|conn| admins::create(conn, username, email.as_deref(), &hash))
        .map_err(|e| match e {
            store::StoreError::Conflict(_) => {
                PortalError::bad_request(format!("Admin {username} already exists"))
            }
            other => other.into(),
        })?;
    Ok(admin)
}
