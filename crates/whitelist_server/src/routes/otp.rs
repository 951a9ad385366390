//! One-time email codes.

use access_policy::email::normalize;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{present, ApiJson};
use crate::auth::generate_otp;
use crate::error::PortalError;
use crate::mail::templates;
use crate::state::AppState;
use crate::store::verifications;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .route("/verify", post(verify))
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub email: Option<String>,
    pub code: Option<String>,
}

async fn send(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendBody>,
) -> Result<Json<Value>, PortalError> {
    let Some(display_email) = present(body.email) else {
        return Err(PortalError::bad_request("Email is required"));
    };
    let email = normalize(&display_email);

    let ttl = state.config.auth.otp_ttl;
    let expires_at = Utc::now()
        + chrono::Duration::from_std(ttl)
            .map_err(|e| PortalError::Internal(format!("invalid OTP lifetime: {e}")))?;
    let code = generate_otp();

    let stored = code.clone();
    state
        .store
        .call(move |conn| {
            verifications::purge_unverified(conn, &email, None)?;
            verifications::create(conn, &email, &stored, expires_at)
        })
        .await?;

    let minutes = (ttl.as_secs() / 60) as i64;
    state
        .send_mail(templates::otp_code(&state.config.branding(), &display_email, &code, minutes))
        .await?;

    info!("🔑 Verification code sent to {}", display_email);

    let mut response = json!({ "message": "Verification code sent" });
    if state.mailer.is_preview() {
        response["previewCode"] = json!(code);
    }
    Ok(Json(response))
}

async fn verify(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyBody>,
) -> Result<Json<Value>, PortalError> {
    let (Some(email), Some(code)) = (present(body.email), present(body.code)) else {
        return Err(PortalError::bad_request("Email and code are required"));
    };
    let email = normalize(&email);

    let record = {
        let email = email.clone();
        state
            .store
            .call(move |conn| verifications::find_unverified(conn, &email, &code))
            .await?
            .ok_or_else(|| PortalError::bad_request("Invalid verification code"))?
    };

    if record.is_expired(Utc::now()) {
        return Err(PortalError::bad_request("Verification code expired"));
    }

    state
        .store
        .call(move |conn| {
            verifications::mark_verified(conn, &record.id)?;
            verifications::purge_unverified(conn, &email, Some(&record.id))
        })
        .await?;

    Ok(Json(json!({ "message": "Email verified" })))
}
