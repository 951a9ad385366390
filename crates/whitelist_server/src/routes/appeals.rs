//! Whitelist appeals: submission by players, review by admins.

use std::collections::HashMap;

use access_policy::email::normalize;
use access_policy::AccessOutcome;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::auth::name_taken;
use super::{present, ApiJson};
use crate::auth::AdminSession;
use crate::error::PortalError;
use crate::mail::templates::{self, AppealSummary};
use crate::state::AppState;
use crate::store::appeals::{self, NewAppeal};
use crate::store::{admins, servers, users, verifications, Appeal, AppealStatus};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit).get(list_pending))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealBody {
    pub email: Option<String>,
    pub minecraft_name: Option<String>,
    pub real_name: Option<String>,
    pub note: Option<String>,
    pub server_id: Option<String>,
}

/// Server fields shown next to a pending appeal.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct PendingAppeal {
    #[serde(flatten)]
    pub appeal: Appeal,
    pub server: Option<ServerSummary>,
}

/// True when the email passed an OTP check or belongs to a verified user.
async fn email_verified(state: &AppState, email: &str) -> Result<bool, PortalError> {
    let email = email.to_string();
    let verified = state
        .store
        .call(move |conn| {
            if verifications::latest_verified(conn, &email)?.is_some() {
                return Ok(true);
            }
            Ok(users::find_by_email(conn, &email)?.map_or(false, |user| user.verified))
        })
        .await?;
    Ok(verified)
}

async fn submit(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AppealBody>,
) -> Result<Json<Value>, PortalError> {
    let (Some(email), Some(minecraft_name), Some(server_id)) = (
        present(body.email),
        present(body.minecraft_name),
        present(body.server_id),
    ) else {
        return Err(PortalError::bad_request("Missing required fields"));
    };
    let email = normalize(&email);

    let server = state.server(&server_id).await?;

    if !email_verified(&state, &email).await? {
        return Err(PortalError::bad_request("Email not verified"));
    }

    let decision = state.decide(&server, &email).await?;
    let new = NewAppeal {
        server_id: server.id.clone(),
        user_email: email.clone(),
        minecraft_name: minecraft_name.clone(),
        real_name: present(body.real_name),
        student_email: decision.has_credential().then(|| email.clone()),
        reason: present(body.note),
    };

    match decision.outcome {
        AccessOutcome::Denied(reason) => Err(PortalError::Forbidden(reason.message())),
        AccessOutcome::Granted => {
            let (appeal, _) = state
                .store
                .call(move |conn| appeals::create_approved(conn, &new))
                .await
                .map_err(|e| name_taken(e, "Minecraft name already registered by another user"))?;

            info!("✅ {} qualifies for {}, access granted", minecraft_name, server.id);
            Ok(Json(json!({
                "message": "You now have access to this server!",
                "appeal": appeal,
            })))
        }
        AccessOutcome::Review => {
            let appeal = state
                .store
                .call(move |conn| appeals::create(conn, &new, AppealStatus::Pending))
                .await?;

            let admin_emails = state.store.call(|conn| admins::notification_emails(conn)).await?;
            if !admin_emails.is_empty() {
                let summary = AppealSummary {
                    server_name: &server.name,
                    user_email: &appeal.user_email,
                    minecraft_name: &appeal.minecraft_name,
                    real_name: appeal.real_name.as_deref(),
                    reason: appeal.reason.as_deref(),
                };
                state
                    .send_mail_best_effort(templates::appeal_notification(&admin_emails, &summary))
                    .await;
            }

            info!("📨 Appeal {} from {} waits for review on {}", appeal.id, minecraft_name, server.id);
            Ok(Json(json!({
                "message": "Request submitted for review.",
                "appeal": appeal,
            })))
        }
    }
}

async fn list_pending(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<PendingAppeal>>, PortalError> {
    let (pending, all_servers) = state
        .store
        .call(|conn| Ok((appeals::list_pending(conn)?, servers::list(conn)?)))
        .await?;

    let by_id: HashMap<String, ServerSummary> = all_servers
        .into_iter()
        .map(|server| {
            (
                server.id.clone(),
                ServerSummary {
                    id: server.id,
                    name: server.name,
                    description: server.description,
                    ip: server.ip,
                },
            )
        })
        .collect();

    let payload = pending
        .into_iter()
        .map(|appeal| PendingAppeal {
            server: by_id.get(&appeal.server_id).cloned(),
            appeal,
        })
        .collect();

    Ok(Json(payload))
}

async fn decide_appeal(
    state: &AppState,
    admin: AdminSession,
    id: String,
    status: AppealStatus,
) -> Result<Appeal, PortalError> {
    let admin_id = admin.admin_id;
    let appeal = state
        .store
        .call(move |conn| appeals::review(conn, &id, status, &admin_id))
        .await
        .map_err(|e| name_taken(e, "Minecraft name already registered by another user"))?
        .ok_or_else(|| PortalError::not_found("Appeal not found"))?;

    info!("⚖️ Appeal {} marked {}", appeal.id, status.as_str());
    Ok(appeal)
}

async fn approve(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, PortalError> {
    let appeal = decide_appeal(&state, admin, id, AppealStatus::Approved).await?;
    Ok(Json(json!({ "message": "Appeal approved", "appeal": appeal })))
}

async fn reject(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, PortalError> {
    let appeal = decide_appeal(&state, admin, id, AppealStatus::Rejected).await?;
    Ok(Json(json!({ "message": "Appeal rejected", "appeal": appeal })))
}
