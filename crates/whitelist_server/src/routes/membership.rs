//! Membership list checks and maintenance.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::present;
use super::servers::EmailQuery;
use crate::auth::AdminSession;
use crate::error::PortalError;
use crate::membership::MembershipStats;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/check", get(check))
        .route("/stats", get(stats))
        .route("/reload", post(reload))
}

async fn check(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Value>, PortalError> {
    let Some(email) = present(query.email) else {
        return Err(PortalError::bad_request("Email is required"));
    };

    let membership = state.membership.clone();
    let result = tokio::task::spawn_blocking(move || membership.check(&email))
        .await
        .map_err(|e| PortalError::Internal(format!("membership check failed: {e}")))??;

    Ok(Json(json!({
        "member": result.member,
        "normalizedEmail": result.normalized_email,
        "source": "csv",
    })))
}

async fn stats(State(state): State<AppState>, _admin: AdminSession) -> Json<MembershipStats> {
    Json(state.membership.stats())
}

async fn reload(State(state): State<AppState>, _admin: AdminSession) -> Result<Json<Value>, PortalError> {
    let membership = state.membership.clone();
    let stats = tokio::task::spawn_blocking(move || membership.reload())
        .await
        .map_err(|e| PortalError::Internal(format!("membership reload failed: {e}")))??;

    Ok(Json(json!({
        "message": "Membership list reloaded",
        "loadedAt": stats.loaded_at,
        "count": stats.count,
        "hash": stats.hash,
        "source": stats.source,
    })))
}
