//! HTTP routes.
//!
//! | Prefix              | Module          |
//! |---------------------|-----------------|
//! | `/`, `/health`      | [`health`]      |
//! | `/api/auth`         | [`auth`]        |
//! | `/api/otp`          | [`otp`]         |
//! | `/api/appeals`      | [`appeals`]     |
//! | `/api/servers`      | [`servers`]     |
//! | `/api/admin`        | [`admin`]       |
//! | `/api/upgrade`      | [`upgrade`]     |
//! | `/api/user`         | [`user`]        |
//! | `/api/membership`   | [`membership`] (also mounted at `/api/orbi`) |
//! | `/api/public`, `/api/check-user` | [`public`] |

pub mod admin;
pub mod appeals;
pub mod auth;
pub mod health;
pub mod membership;
pub mod otp;
pub mod public;
pub mod servers;
pub mod upgrade;
pub mod user;

use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::PortalError;
use crate::state::AppState;

/// Builds the complete API router.
pub fn router(state: AppState) -> Router {
    let membership = membership::routes();

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest("/api/auth", auth::routes())
        .nest("/api/otp", otp::routes())
        .nest("/api/appeals", appeals::routes())
        .nest("/api/servers", servers::routes())
        .nest("/api/admin", admin::routes())
        .nest("/api/upgrade", upgrade::routes())
        .nest("/api/user", user::routes())
        .nest("/api/membership", membership.clone())
        .nest("/api/orbi", membership)
        .nest("/api/public", public::routes())
        .route("/api/check-user", get(public::check_user))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// JSON body whose rejection is reported as `{"error": ...}` with status 400.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(PortalError::BadRequest(rejection.body_text())),
        }
    }
}

/// Trimmed value, or `None` when missing or blank.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
