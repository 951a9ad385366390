//! Error types for status polling.

use std::time::Duration;
use thiserror::Error;

/// Failure while talking to a Minecraft server.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed status response: {0}")]
    Json(#[from] serde_json::Error),
}
