//! Runtime configuration of the portal.
//!
//! The binary builds this from its TOML file; tests build it directly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::mail::templates::Branding;

/// Configuration for [`PortalServer`](crate::PortalServer).
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Address the HTTP API listens on
    pub bind_address: SocketAddr,

    /// SQLite file; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,

    /// JSON file imported into an empty server table on start
    pub servers_seed: Option<PathBuf>,

    /// Base URL of the frontend, used in magic links
    pub frontend_url: String,

    pub app_name: String,
    pub support_email: String,

    /// Emails ending with this domain get the credential on email login
    pub student_email_domain: Option<String>,

    /// Server used by the plugin check when the request names none
    pub plugin_default_server_id: Option<String>,

    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub membership: MembershipConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for admin tokens
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// Lifetime of emailed one-time codes
    pub otp_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// `None`, `localhost` or `127.0.0.1` selects the logging transport
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Candidate CSV paths, first existing wins
    pub csv_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StatusConfig {
    pub cache_ttl: Duration,
    pub timeout: Duration,
    /// Background refresh of every server; `None` refreshes on demand only
    pub poll_interval: Option<Duration>,
    /// Regexes for hosts that get a bare TCP check when the ping fails
    pub internal_hosts: Vec<String>,
}

impl PortalConfig {
    pub fn branding(&self) -> Branding {
        Branding {
            app_name: self.app_name.clone(),
            support_email: self.support_email.clone(),
            frontend_url: self.frontend_url.clone(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3001)),
            database_path: None,
            servers_seed: None,
            frontend_url: "http://localhost:5173".to_string(),
            app_name: "Minecraft Whitelist".to_string(),
            support_email: "minecraft@example.org".to_string(),
            student_email_domain: Some("@student.uu.se".to_string()),
            plugin_default_server_id: None,
            auth: AuthConfig::default(),
            mail: MailConfig::default(),
            membership: MembershipConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            otp_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_password: None,
            from: "Minecraft Whitelist <noreply@example.org>".to_string(),
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            csv_paths: vec![
                PathBuf::from("data/members.csv"),
                PathBuf::from("members.csv"),
            ],
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(30_000),
            timeout: Duration::from_millis(2_000),
            poll_interval: None,
            internal_hosts: server_status::MonitorConfig::default_internal_patterns(),
        }
    }
}
