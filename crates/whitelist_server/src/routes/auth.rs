//! Player registration and magic-link verification.

use access_policy::email::normalize;
use access_policy::AccessOutcome;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{present, ApiJson};
use crate::auth::generate_token;
use crate::error::PortalError;
use crate::mail::templates;
use crate::state::AppState;
use crate::store::users::{self, Registration};
use crate::store::StoreError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify", get(verify))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub email: Option<String>,
    pub minecraft_name: Option<String>,
    pub real_name: Option<String>,
    pub server_id: Option<String>,
}

/// Maps a unique violation on the Minecraft name to a readable 400.
pub(crate) fn name_taken(error: StoreError, message: &str) -> PortalError {
    if error.is_conflict_on("minecraft_name") {
        PortalError::bad_request(message)
    } else {
        error.into()
    }
}

async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterBody>,
) -> Result<Json<Value>, PortalError> {
    let (Some(email), Some(minecraft_name), Some(server_id)) = (
        present(body.email),
        present(body.minecraft_name),
        present(body.server_id),
    ) else {
        return Err(PortalError::bad_request(
            "Email, Minecraft name, and server ID are required",
        ));
    };
    let email = normalize(&email);

    let server = state.server(&server_id).await?;
    let decision = state.decide(&server, &email).await?;
    if let AccessOutcome::Denied(reason) = &decision.outcome {
        return Err(PortalError::bad_request(reason.message()));
    }

    let token = generate_token();
    let registration = Registration {
        email: email.clone(),
        minecraft_name,
        real_name: body.real_name,
        credential: decision.has_credential(),
        token: token.clone(),
    };
    let user = state
        .store
        .call(move |conn| users::upsert_for_registration(conn, &registration))
        .await
        .map_err(|e| name_taken(e, "Minecraft name already registered by another user"))?;

    state
        .send_mail(templates::verification(&state.config.branding(), &email, &token))
        .await?;

    info!("📝 Registration for {} on {} ({:?})", user.id, server.id, decision.outcome);

    Ok(Json(json!({
        "message": "Verification email sent",
        "userId": user.id,
        "requiresRules": !server.rules.is_empty(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

async fn verify(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, PortalError> {
    let token = query.token.unwrap_or_default();
    let user = state
        .store
        .call(move |conn| {
            let Some(user) = users::find_by_token(conn, &token)? else {
                return Ok(None);
            };
            users::mark_verified(conn, &user.id)?;
            Ok(Some(user))
        })
        .await?
        .ok_or_else(|| PortalError::bad_request("Invalid or expired token"))?;

    info!("✅ Email verified for user {}", user.id);

    Ok(Json(json!({
        "message": "Email verified successfully",
        "userId": user.id,
        "minecraftName": user.minecraft_name,
        "email": user.email,
    })))
}
