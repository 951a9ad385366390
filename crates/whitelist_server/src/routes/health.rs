use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::PortalError;
use crate::state::AppState;
use crate::store::servers;

pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "Minecraft Server Whitelist API",
    }))
}

/// Liveness plus a database round trip.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, PortalError> {
    let server_count = state
        .store
        .call(|conn| servers::list(conn).map(|list| list.len()))
        .await?;

    Ok(Json(json!({
        "status": "ok",
        "servers": server_count,
        "membershipLoaded": state.membership.stats().loaded_at.is_some(),
        "timestamp": Utc::now(),
    })))
}
