//! Endpoints polled by the game-server plugin.
//!
//! A player is allowed when their account is verified and they accepted the
//! rules of the server.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{present, ApiJson};
use crate::error::PortalError;
use crate::state::AppState;
use crate::store::access;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/check-whitelist/:server_id", get(check_whitelist))
        .route("/get-names/:server_id", post(get_names))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuery {
    pub username: Option<String>,
    pub server_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistAnswer {
    pub allowed: bool,
    pub username: String,
    pub server_id: String,
    pub real_name: Option<String>,
}

/// Looks `username` up on `server_id`, which must exist.
async fn lookup(state: &AppState, username: String, server_id: String) -> Result<WhitelistAnswer, PortalError> {
    let server = state.server(&server_id).await?;

    let name = username.clone();
    let user = state
        .store
        .call(move |conn| access::whitelisted_user(conn, &name, &server.id))
        .await?;

    debug!("Whitelist lookup {} on {}: {}", username, server_id, user.is_some());
    Ok(WhitelistAnswer {
        allowed: user.is_some(),
        username,
        server_id,
        real_name: user.and_then(|u| u.real_name),
    })
}

async fn check_whitelist(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<WhitelistAnswer>, PortalError> {
    let username = present(query.username).unwrap_or_default();
    Ok(Json(lookup(&state, username, server_id).await?))
}

/// `GET /api/check-user`. Every answer, including errors, carries `allowed`
/// so the plugin can fail closed.
pub async fn check_user(State(state): State<AppState>, Query(query): Query<PlayerQuery>) -> Response {
    let Some(username) = present(query.username) else {
        return plugin_error(StatusCode::BAD_REQUEST, "username is required");
    };
    let Some(server_id) =
        present(query.server_id).or_else(|| state.config.plugin_default_server_id.clone())
    else {
        return plugin_error(
            StatusCode::BAD_REQUEST,
            "serverId missing (configure a default server or provide ?serverId=)",
        );
    };

    match lookup(&state, username, server_id).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => {
            if e.status().is_server_error() {
                error!("❌ {}", e);
            }
            plugin_error(e.status(), &e.public_message())
        }
    }
}

fn plugin_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message, "allowed": false }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NamesBody {
    pub usernames: Option<Value>,
}

/// Maps whitelisted usernames to display names. Others are left out.
async fn get_names(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
    ApiJson(body): ApiJson<NamesBody>,
) -> Result<Json<BTreeMap<String, String>>, PortalError> {
    let Some(Value::Array(items)) = body.usernames else {
        return Err(PortalError::bad_request("usernames must be an array"));
    };
    let names: Vec<String> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name),
            _ => None,
        })
        .collect();

    let server = state.server(&server_id).await?;
    let pairs = state
        .store
        .call(move |conn| access::whitelisted_names(conn, &server.id, &names))
        .await?;

    Ok(Json(pairs.into_iter().collect()))
}
