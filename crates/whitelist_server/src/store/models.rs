//! Row types returned by the repositories.
//!
//! All serialize in camelCase, the shape the portal frontend reads.

use access_policy::{AccessLevel, AppealPolicy, ServerPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A player who registered through the portal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Trimmed and lowercased
    pub email: String,
    /// Unset for accounts created through email login before registering
    pub minecraft_name: Option<String>,
    pub real_name: Option<String>,
    /// Holds a checked credential (student email or membership)
    pub is_student: bool,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A one-time code sent to an email.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerification {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl EmailVerification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerAccess {
    pub id: String,
    pub user_id: String,
    pub server_id: String,
    pub rules_accepted: bool,
    pub granted_at: DateTime<Utc>,
}

/// A request for a higher access level, confirmed by magic link.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: String,
    pub user_id: String,
    pub requested_level: String,
    pub email: String,
    pub real_name: String,
    pub note: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub verified: bool,
    pub approved: bool,
    pub rejected: bool,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub minecraft_name: Option<String>,
    pub email: String,
}

/// Access request awaiting review, with the requesting user.
#[derive(Debug, Clone, Serialize)]
pub struct PendingAccessRequest {
    #[serde(flatten)]
    pub request: AccessRequest,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

impl AppealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealStatus::Pending => "pending",
            AppealStatus::Approved => "approved",
            AppealStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "approved" => AppealStatus::Approved,
            "rejected" => AppealStatus::Rejected,
            _ => AppealStatus::Pending,
        }
    }
}

/// A whitelist request for one server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub id: String,
    pub server_id: String,
    pub user_email: String,
    pub minecraft_name: String,
    pub real_name: Option<String>,
    /// The applicant's email when it passed a credential check
    pub student_email: Option<String>,
    pub reason: Option<String>,
    pub status: AppealStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A Minecraft server listed on the portal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub description: String,
    /// `host[:port]` used for status pings and shown to players
    pub ip: String,
    pub access_level: AccessLevel,
    pub required_email_domain: Option<String>,
    pub contact: Option<String>,
    pub rules: Vec<String>,
    pub appeal_policy: AppealPolicy,
    pub position: i64,
}

impl Server {
    pub fn policy(&self) -> ServerPolicy {
        ServerPolicy {
            access_level: self.access_level,
            appeal_policy: self.appeal_policy,
            required_email_domain: self.required_email_domain.clone(),
        }
    }
}

/// Fields of a server being created, also the shape of the JSON seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub ip: String,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub required_email_domain: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub appeal_policy: AppealPolicy,
}

/// Partial server update. `None` leaves a field untouched; an empty string
/// clears `required_email_domain` and `contact`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ip: Option<String>,
    pub access_level: Option<AccessLevel>,
    pub required_email_domain: Option<String>,
    pub contact: Option<String>,
    pub rules: Option<Vec<String>>,
    pub appeal_policy: Option<AppealPolicy>,
}
