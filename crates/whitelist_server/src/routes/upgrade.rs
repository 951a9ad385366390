//! Requests for a higher access level, confirmed by magic link and then
//! reviewed under `/api/admin/access-requests`.

use access_policy::email::normalize;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::TokenQuery;
use super::{present, ApiJson};
use crate::auth::generate_token;
use crate::error::PortalError;
use crate::mail::templates;
use crate::state::AppState;
use crate::store::requests::{self, NewAccessRequest};
use crate::store::users;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/request", post(request))
        .route("/verify", get(verify))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeBody {
    pub user_id: Option<String>,
    pub requested_level: Option<String>,
    pub email: Option<String>,
    pub real_name: Option<String>,
    pub note: Option<String>,
}

async fn request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UpgradeBody>,
) -> Result<Json<Value>, PortalError> {
    let (Some(user_id), Some(requested_level), Some(email), Some(real_name)) = (
        present(body.user_id),
        present(body.requested_level),
        present(body.email),
        present(body.real_name),
    ) else {
        return Err(PortalError::bad_request("Missing required fields"));
    };

    let token = generate_token();
    let new = NewAccessRequest {
        user_id,
        requested_level,
        email: normalize(&email),
        real_name,
        note: present(body.note),
        token: token.clone(),
    };

    let created = state
        .store
        .call(move |conn| {
            if users::find_by_id(conn, &new.user_id)?.is_none() {
                return Ok(None);
            }
            requests::create(conn, &new).map(Some)
        })
        .await?
        .ok_or_else(|| PortalError::not_found("User not found"))?;

    state
        .send_mail(templates::verification(&state.config.branding(), &created.email, &token))
        .await?;

    info!("📝 Access request {} for level {}", created.id, created.requested_level);

    Ok(Json(json!({
        "message": "Verification email sent",
        "requestId": created.id,
    })))
}

async fn verify(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, PortalError> {
    let token = query.token.unwrap_or_default();
    let verified = state
        .store
        .call(move |conn| requests::verify_by_token(conn, &token))
        .await?
        .ok_or_else(|| PortalError::bad_request("Invalid or expired token"))?;

    Ok(Json(json!({
        "message": "Email verified. Your request is pending admin approval.",
        "requestId": verified.id,
    })))
}
