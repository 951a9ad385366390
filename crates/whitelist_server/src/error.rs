//! API error type.
//!
//! Every failure reaches the client as `{"error": "..."}` with a fitting
//! status code. Internal details are logged, not returned.

use access_policy::MembershipError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::mail::MailError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Membership check failed: {0}")]
    Membership(#[from] MembershipError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortalError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        PortalError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PortalError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PortalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Membership(MembershipError::ListMissing(_)) => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            PortalError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            PortalError::Membership(_)
            | PortalError::Store(_)
            | PortalError::Mail(_)
            | PortalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            PortalError::BadRequest(message)
            | PortalError::Unauthorized(message)
            | PortalError::Forbidden(message)
            | PortalError::NotFound(message) => message.clone(),
            PortalError::Membership(MembershipError::ListMissing(_)) => {
                "Membership list missing on server".to_string()
            }
            PortalError::Membership(MembershipError::Unavailable(_)) => {
                "Unable to verify membership right now".to_string()
            }
            PortalError::Store(StoreError::Invalid(message)) => message.clone(),
            PortalError::Store(StoreError::Conflict(_)) => "Already exists".to_string(),
            PortalError::Mail(_) => "Failed to send email".to_string(),
            PortalError::Store(_) | PortalError::Internal(_) => "Server error".to_string(),
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ {}", self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
