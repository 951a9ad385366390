//! Player profile and email login.

use access_policy::email::{has_domain, normalize};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::auth::name_taken;
use super::{present, ApiJson};
use crate::auth::generate_token;
use crate::error::PortalError;
use crate::mail::templates;
use crate::state::AppState;
use crate::store::{access, requests, users, AccessRequest, ServerAccess, User};

/// Number of access requests shown on a profile.
const RECENT_REQUESTS: usize = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile/:id", get(profile).put(update_profile))
        .route("/login", post(login))
        .route("/my-servers/:id", get(my_servers))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub server_access: Vec<ServerAccess>,
    pub access_requests: Vec<AccessRequest>,
}

async fn profile(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Profile>, PortalError> {
    let profile = state
        .store
        .call(move |conn| {
            let Some(user) = users::find_by_id(conn, &id)? else {
                return Ok(None);
            };
            Ok(Some(Profile {
                server_access: access::list_for_user(conn, &user.id)?,
                access_requests: requests::list_for_user(conn, &user.id, RECENT_REQUESTS)?,
                user,
            }))
        })
        .await?
        .ok_or_else(|| PortalError::not_found("User not found"))?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub real_name: Option<String>,
    pub minecraft_name: Option<String>,
}

async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<ProfileUpdate>,
) -> Result<Json<User>, PortalError> {
    let user = state
        .store
        .call(move |conn| {
            users::update_profile(
                conn,
                &id,
                changes.real_name.as_deref(),
                changes.minecraft_name.as_deref(),
            )
        })
        .await
        .map_err(|e| name_taken(e, "Minecraft name already taken"))?
        .ok_or_else(|| PortalError::not_found("User not found"))?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: Option<String>,
}

/// Sends a magic link, creating the account on first login.
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<Value>, PortalError> {
    let Some(email) = present(body.email) else {
        return Err(PortalError::bad_request("Email is required"));
    };
    let email = normalize(&email);
    let credential = state
        .config
        .student_email_domain
        .as_deref()
        .map_or(false, |domain| has_domain(&email, domain));

    let token = generate_token();
    let user = {
        let (email, token) = (email.clone(), token.clone());
        state
            .store
            .call(move |conn| match users::find_by_email(conn, &email)? {
                Some(user) => {
                    users::set_token(conn, &user.id, &token)?;
                    Ok(user)
                }
                None => users::create_for_login(conn, &email, credential, &token),
            })
            .await?
    };

    state
        .send_mail(templates::verification(&state.config.branding(), &email, &token))
        .await?;

    info!("📧 Login link sent for user {}", user.id);

    Ok(Json(json!({
        "message": "Verification email sent",
        "userId": user.id,
    })))
}

async fn my_servers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ServerAccess>>, PortalError> {
    Ok(Json(
        state.store.call(move |conn| access::list_for_user(conn, &id)).await?,
    ))
}
