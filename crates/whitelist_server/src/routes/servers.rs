//! Server listing, access checks and admin management.

use access_policy::email::normalize;
use access_policy::{AccessDecision, AccessLevel, AccessOutcome, AppealPolicy};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use server_status::StatusSnapshot;
use tracing::info;

use super::{present, ApiJson};
use crate::auth::AdminSession;
use crate::error::PortalError;
use crate::state::AppState;
use crate::store::{access, appeals, servers, users, NewServer, Server, ServerUpdate, StoreError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/reorder", post(reorder))
        .route("/:id", get(show).put(update).delete(remove))
        .route("/:id/status", get(status))
        .route("/:id/access", get(preview_access))
        .route("/:id/accept-rules", post(accept_rules))
        .route("/:id/check-access/:user_id", get(check_access))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Server>>, PortalError> {
    Ok(Json(state.store.call(|conn| servers::list(conn)).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Server>, PortalError> {
    Ok(Json(state.server(&id).await?))
}

/// Cached status; never waits for the ping.
async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusSnapshot>, PortalError> {
    let server = state.server(&id).await?;
    Ok(Json(state.status.request(&server.id, &server.ip)))
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

/// What would happen if `email` applied to a server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPreview {
    pub server_id: String,
    pub email: String,
    #[serde(flatten)]
    pub decision: AccessDecision,
    /// Explanation shown when the outcome is a denial
    pub message: Option<String>,
}

async fn preview_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<AccessPreview>, PortalError> {
    let Some(email) = present(query.email) else {
        return Err(PortalError::bad_request("Email is required"));
    };
    let email = normalize(&email);
    let server = state.server(&id).await?;
    let decision = state.decide(&server, &email).await?;

    let message = match &decision.outcome {
        AccessOutcome::Denied(reason) => Some(reason.message()),
        _ => None,
    };
    Ok(Json(AccessPreview {
        server_id: server.id,
        email,
        decision,
        message,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRulesBody {
    pub user_id: Option<String>,
}

/// True when a verified user may be whitelisted on `server`.
///
/// Qualifying on the policy is enough. On student servers a credential
/// earned earlier (registration or an approved upgrade) also counts unless
/// every request is reviewed. An approved appeal always counts.
fn may_join(decision: &AccessDecision, server: &Server, is_student: bool, appeal_approved: bool) -> bool {
    if decision.outcome.is_granted() || appeal_approved {
        return true;
    }
    server.access_level == AccessLevel::Student
        && is_student
        && decision.effective_policy != AppealPolicy::Always
}

async fn accept_rules(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AcceptRulesBody>,
) -> Result<Json<Value>, PortalError> {
    let server = state.server(&id).await?;

    let user_id = body.user_id.unwrap_or_default();
    let user = state
        .store
        .call(move |conn| users::find_by_id(conn, &user_id))
        .await?
        .filter(|user| user.verified)
        .ok_or_else(|| PortalError::bad_request("User not found or not verified"))?;

    let decision = state.decide(&server, &user.email).await?;
    let appeal_approved = {
        let (server_id, email) = (server.id.clone(), user.email.clone());
        state
            .store
            .call(move |conn| appeals::has_approved(conn, &server_id, &email))
            .await?
    };

    if !may_join(&decision, &server, user.is_student, appeal_approved) {
        let message = match &decision.outcome {
            AccessOutcome::Denied(reason) => reason.message(),
            _ => "Access to this server requires admin approval".to_string(),
        };
        return Err(PortalError::Forbidden(message));
    }

    let granted = {
        let (user_id, server_id) = (user.id.clone(), server.id.clone());
        state
            .store
            .call(move |conn| access::accept_rules(conn, &user_id, &server_id))
            .await?
    };

    info!("🎮 {} accepted the rules of {}", user.id, server.id);

    Ok(Json(json!({
        "message": "Access granted",
        "access": granted,
        "minecraftName": user.minecraft_name,
    })))
}

async fn check_access(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<Value>, PortalError> {
    let server = state.server(&id).await?;

    let (user, found) = state
        .store
        .call(move |conn| {
            let user = users::find_by_id(conn, &user_id)?;
            let found = match &user {
                Some(user) => access::find(conn, &user.id, &server.id)?,
                None => None,
            };
            Ok((user, found))
        })
        .await?;

    match user {
        Some(user) if user.verified => {
            let rules_accepted = found.map_or(false, |a| a.rules_accepted);
            Ok(Json(json!({
                "hasAccess": rules_accepted,
                "verified": true,
                "rulesAccepted": rules_accepted,
                "requiresAuth": true,
            })))
        }
        _ => Ok(Json(json!({ "hasAccess": false, "verified": false }))),
    }
}

/// Body of `POST /api/servers`. Required fields are checked by hand so the
/// client gets a readable message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerBody {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ip: Option<String>,
    #[serde(default)]
    pub access_level: AccessLevel,
    pub required_email_domain: Option<String>,
    pub contact: Option<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub appeal_policy: AppealPolicy,
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiJson(body): ApiJson<CreateServerBody>,
) -> Result<Json<Server>, PortalError> {
    let (Some(id), Some(name), Some(description), Some(ip)) = (
        present(body.id),
        present(body.name),
        present(body.description),
        present(body.ip),
    ) else {
        return Err(PortalError::bad_request("ID, name, description, and IP are required"));
    };

    let new = NewServer {
        id,
        name,
        description,
        ip,
        access_level: body.access_level,
        required_email_domain: body.required_email_domain,
        contact: body.contact,
        rules: body.rules,
        appeal_policy: body.appeal_policy,
    };
    let server = state
        .store
        .call(move |conn| servers::create(conn, &new))
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => PortalError::bad_request("Server with this ID already exists"),
            other => other.into(),
        })?;

    info!("🆕 Server {} created", server.id);
    Ok(Json(server))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<ServerUpdate>,
) -> Result<Json<Server>, PortalError> {
    let server = state
        .store
        .call(move |conn| servers::update(conn, &id, &changes))
        .await?
        .ok_or_else(|| PortalError::not_found("Server not found"))?;

    // The address may have changed.
    state.status.forget(&server.id);
    info!("✏️ Server {} updated", server.id);
    Ok(Json(server))
}

async fn remove(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, PortalError> {
    let server_id = id.clone();
    let removed = state.store.call(move |conn| servers::delete(conn, &server_id)).await?;
    if !removed {
        return Err(PortalError::not_found("Server not found"));
    }

    state.status.forget(&id);
    info!("🗑️ Server {} deleted", id);
    Ok(Json(json!({ "message": "Server deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub order: Vec<String>,
}

async fn reorder(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiJson(body): ApiJson<ReorderBody>,
) -> Result<Json<Vec<Server>>, PortalError> {
    let servers = state
        .store
        .call(move |conn| servers::reorder(conn, &body.order))
        .await?;
    info!("↕️ Server order updated");
    Ok(Json(servers))
}
