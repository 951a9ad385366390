//! Admin login and access-request review.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{present, ApiJson};
use crate::auth::{issue_token, verify_password, AdminSession};
use crate::error::PortalError;
use crate::state::AppState;
use crate::store::{admins, requests, PendingAccessRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/access-requests", get(list_requests))
        .route("/access-requests/:id/approve", post(approve_request))
        .route("/access-requests/:id/reject", post(reject_request))
}

/// `identifier` may be a username or an email; `username` is the older field name.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub identifier: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<Value>, PortalError> {
    let invalid = || PortalError::Unauthorized("Invalid credentials".to_string());

    let identifier = present(body.identifier).or_else(|| present(body.username));
    let (Some(identifier), Some(password)) = (identifier, body.password) else {
        return Err(invalid());
    };

    let lookup = identifier.clone();
    let admin = state
        .store
        .call(move |conn| admins::find_by_identifier(conn, &lookup))
        .await?;
    let Some(admin) = admin else {
        warn!("🔒 Failed admin login for {}", identifier);
        return Err(invalid());
    };

    let hash = admin.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PortalError::Internal(format!("password check failed: {e}")))?;
    if !matches {
        warn!("🔒 Failed admin login for {}", identifier);
        return Err(invalid());
    }

    let token = issue_token(&state.config.auth.jwt_secret, &admin.id, state.config.auth.token_ttl)?;
    info!("🔓 Admin {} logged in", admin.username);

    Ok(Json(json!({ "token": token, "username": admin.username })))
}

async fn list_requests(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<PendingAccessRequest>>, PortalError> {
    Ok(Json(state.store.call(|conn| requests::list_pending(conn)).await?))
}

async fn approve_request(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, PortalError> {
    let admin_id = admin.admin_id;
    let request = state
        .store
        .call(move |conn| requests::approve(conn, &id, &admin_id))
        .await?;

    info!("⬆️ Access request {} approved ({})", request.id, request.requested_level);
    Ok(Json(json!({ "message": "Request approved", "request": request })))
}

async fn reject_request(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, PortalError> {
    let admin_id = admin.admin_id;
    let request = state
        .store
        .call(move |conn| requests::reject(conn, &id, &admin_id))
        .await?
        .ok_or_else(|| PortalError::not_found("Request not found"))?;

    info!("⬇️ Access request {} rejected", request.id);
    Ok(Json(json!({ "message": "Request rejected", "request": request })))
}
