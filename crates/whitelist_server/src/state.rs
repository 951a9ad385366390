//! Shared handler state.

use access_policy::{evaluate, AccessDecision, AccessLevel};
use server_status::StatusMonitor;
use std::sync::Arc;
use tracing::warn;

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::mail::{Mailer, OutgoingMail};
use crate::membership::MembershipList;
use crate::store::{servers, Server, Store};

/// Everything a request handler may touch. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub store: Store,
    pub mailer: Arc<dyn Mailer>,
    pub membership: Arc<MembershipList>,
    pub status: Arc<StatusMonitor>,
}

impl AppState {
    /// Loads a server or fails with 404 "Server not found".
    pub async fn server(&self, server_id: &str) -> Result<Server, PortalError> {
        let id = server_id.to_string();
        self.store
            .call(move |conn| servers::get(conn, &id))
            .await?
            .ok_or_else(|| PortalError::not_found("Server not found"))
    }

    /// Runs the access decision for `email` on `server`.
    ///
    /// Only membership servers consult the CSV list, which may read and hash
    /// the file, so those decisions run on the blocking pool.
    pub async fn decide(&self, server: &Server, email: &str) -> Result<AccessDecision, PortalError> {
        let policy = server.policy();
        if policy.access_level != AccessLevel::Member {
            return Ok(evaluate(&policy, email, self.membership.as_ref())?);
        }

        let membership = self.membership.clone();
        let email = email.to_string();
        let decision = tokio::task::spawn_blocking(move || evaluate(&policy, &email, membership.as_ref()))
            .await
            .map_err(|e| PortalError::Internal(format!("access decision failed: {e}")))??;
        Ok(decision)
    }

    pub async fn send_mail(&self, mail: OutgoingMail) -> Result<(), PortalError> {
        self.mailer.send(mail).await?;
        Ok(())
    }

    /// Sends without failing the request; delivery errors are logged.
    pub async fn send_mail_best_effort(&self, mail: OutgoingMail) {
        let subject = mail.subject.clone();
        if let Err(e) = self.mailer.send(mail).await {
            warn!("Failed to send \"{}\": {}", subject, e);
        }
    }
}
