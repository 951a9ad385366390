//! Table definitions.

use rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id              TEXT PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    email           TEXT,
    password_hash   TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id                  TEXT PRIMARY KEY,
    email               TEXT NOT NULL UNIQUE,
    minecraft_name      TEXT UNIQUE,
    real_name           TEXT,
    is_student          INTEGER NOT NULL DEFAULT 0,
    verified            INTEGER NOT NULL DEFAULT 0,
    verification_token  TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_token ON users (verification_token);

CREATE TABLE IF NOT EXISTS email_verifications (
    id          TEXT PRIMARY KEY,
    email       TEXT NOT NULL,
    code        TEXT NOT NULL,
    expires_at  TEXT NOT NULL,
    verified    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_email_verifications_email ON email_verifications (email);

CREATE TABLE IF NOT EXISTS servers (
    id                      TEXT PRIMARY KEY,
    name                    TEXT NOT NULL,
    description             TEXT NOT NULL,
    ip                      TEXT NOT NULL,
    access_level            TEXT NOT NULL DEFAULT 'open',
    required_email_domain   TEXT,
    contact                 TEXT,
    rules                   TEXT NOT NULL DEFAULT '[]',
    appeal_policy           TEXT NOT NULL DEFAULT 'never',
    position                INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS server_access (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    server_id       TEXT NOT NULL,
    rules_accepted  INTEGER NOT NULL DEFAULT 0,
    granted_at      TEXT NOT NULL,
    UNIQUE (user_id, server_id)
);

CREATE TABLE IF NOT EXISTS access_requests (
    id                  TEXT PRIMARY KEY,
    user_id             TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    requested_level     TEXT NOT NULL,
    email               TEXT NOT NULL,
    real_name           TEXT NOT NULL,
    note                TEXT,
    verification_token  TEXT,
    verified            INTEGER NOT NULL DEFAULT 0,
    approved            INTEGER NOT NULL DEFAULT 0,
    rejected            INTEGER NOT NULL DEFAULT 0,
    reviewed_by         TEXT,
    reviewed_at         TEXT,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS appeals (
    id              TEXT PRIMARY KEY,
    server_id       TEXT NOT NULL,
    user_email      TEXT NOT NULL,
    minecraft_name  TEXT NOT NULL,
    real_name       TEXT,
    student_email   TEXT,
    reason          TEXT,
    status          TEXT NOT NULL DEFAULT 'pending',
    reviewed_by     TEXT,
    reviewed_at     TEXT,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_appeals_status ON appeals (status);
"#;

/// Creates missing tables and indexes. Safe to run on every start.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
