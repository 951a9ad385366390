//! Configuration file of the portal launcher.
//!
//! Loaded from TOML, overridden by the command line and a few environment
//! variables for secrets, then converted into the library's [`PortalConfig`].

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use whitelist_server::config::{AuthConfig, MailConfig, MembershipConfig, StatusConfig};
use whitelist_server::PortalConfig;

/// Overrides `auth.jwt_secret`.
pub const ENV_JWT_SECRET: &str = "PORTAL_JWT_SECRET";
/// Overrides `mail.smtp_password`.
pub const ENV_SMTP_PASSWORD: &str = "PORTAL_SMTP_PASSWORD";
/// Replaces `membership.csv_paths` with a single path.
pub const ENV_MEMBERSHIP_CSV: &str = "PORTAL_MEMBERSHIP_CSV";

/// Database path meaning "keep everything in memory".
pub const IN_MEMORY: &str = ":memory:";

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub membership: MembershipSettings,
    pub status: StatusSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener and what the frontend needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network address to bind the API to (e.g., "127.0.0.1:3001")
    pub bind_address: String,
    /// Base URL of the frontend, used in magic links
    pub frontend_url: String,
    pub app_name: String,
    pub support_email: String,
    /// JSON file of servers imported into an empty database
    pub servers_seed: Option<String>,
    /// Server the plugin check uses when none is given
    pub plugin_default_server_id: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3001".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            app_name: "Minecraft Whitelist".to_string(),
            support_email: "minecraft@example.org".to_string(),
            servers_seed: Some("servers.json".to_string()),
            plugin_default_server_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "data/portal.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    /// Admin session lifetime
    pub token_ttl_hours: u64,
    /// One-time code lifetime
    pub otp_ttl_minutes: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            token_ttl_hours: 24,
            otp_ttl_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    /// Unset, `localhost` or `127.0.0.1` logs mail instead of sending it
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        let mail = MailConfig::default();
        Self {
            smtp_host: mail.smtp_host,
            smtp_port: mail.smtp_port,
            smtp_user: mail.smtp_user,
            smtp_password: mail.smtp_password,
            from: mail.from,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipSettings {
    /// Candidate CSV files, first existing wins
    pub csv_paths: Vec<String>,
    /// Email suffix that earns the student credential on email login
    pub student_email_domain: Option<String>,
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            csv_paths: MembershipConfig::default()
                .csv_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            student_email_domain: Some("@student.uu.se".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub cache_ttl_ms: u64,
    pub timeout_ms: u64,
    /// Background refresh interval in seconds (0 to disable)
    pub poll_interval_secs: u64,
    /// Regexes for hosts that get a plain TCP check when the ping fails
    pub internal_hosts: Vec<String>,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 30_000,
            timeout_ms: 2_000,
            poll_interval_secs: 60,
            internal_hosts: server_status::MonitorConfig::default_internal_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, writing the defaults there first when
    /// the file does not exist.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies the secret overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(secret) = get(ENV_JWT_SECRET) {
            self.auth.jwt_secret = secret;
        }
        if let Some(password) = get(ENV_SMTP_PASSWORD) {
            self.mail.smtp_password = Some(password);
        }
        if let Some(csv) = get(ENV_MEMBERSHIP_CSV) {
            self.membership.csv_paths = vec![csv];
        }
    }

    /// Checks everything that would otherwise fail later at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.server.bind_address));
        }

        if self.auth.jwt_secret.trim().is_empty() {
            return Err("JWT secret cannot be empty".to_string());
        }
        if self.auth.token_ttl_hours == 0 {
            return Err("Admin token lifetime must be positive".to_string());
        }
        if self.auth.otp_ttl_minutes == 0 {
            return Err("Verification code lifetime must be positive".to_string());
        }

        if self.database.path.trim().is_empty() {
            return Err("Database path cannot be empty".to_string());
        }

        if self.status.cache_ttl_ms == 0 || self.status.timeout_ms == 0 {
            return Err("Status cache TTL and timeout must be positive".to_string());
        }
        for pattern in &self.status.internal_hosts {
            if let Err(e) = regex_check(pattern) {
                return Err(format!("Invalid internal host pattern {pattern}: {e}"));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }

        Ok(())
    }

    /// Database file, or `None` for an in-memory database.
    pub fn database_path(&self) -> Option<PathBuf> {
        let path = self.database.path.trim();
        (path != IN_MEMORY).then(|| PathBuf::from(path))
    }

    /// Converts to the library configuration.
    pub fn to_portal_config(&self) -> Result<PortalConfig, Box<dyn std::error::Error>> {
        Ok(PortalConfig {
            bind_address: self.server.bind_address.parse()?,
            database_path: self.database_path(),
            servers_seed: self.server.servers_seed.as_ref().map(PathBuf::from),
            frontend_url: self.server.frontend_url.clone(),
            app_name: self.server.app_name.clone(),
            support_email: self.server.support_email.clone(),
            student_email_domain: self.membership.student_email_domain.clone(),
            plugin_default_server_id: self.server.plugin_default_server_id.clone(),
            auth: AuthConfig {
                jwt_secret: self.auth.jwt_secret.clone(),
                token_ttl: Duration::from_secs(self.auth.token_ttl_hours * 60 * 60),
                otp_ttl: Duration::from_secs(self.auth.otp_ttl_minutes * 60),
            },
            mail: MailConfig {
                smtp_host: self.mail.smtp_host.clone(),
                smtp_port: self.mail.smtp_port,
                smtp_user: self.mail.smtp_user.clone(),
                smtp_password: self.mail.smtp_password.clone(),
                from: self.mail.from.clone(),
            },
            membership: MembershipConfig {
                csv_paths: self.membership.csv_paths.iter().map(PathBuf::from).collect(),
            },
            status: StatusConfig {
                cache_ttl: Duration::from_millis(self.status.cache_ttl_ms),
                timeout: Duration::from_millis(self.status.timeout_ms),
                poll_interval: (self.status.poll_interval_secs > 0)
                    .then(|| Duration::from_secs(self.status.poll_interval_secs)),
                internal_hosts: self.status.internal_hosts.clone(),
            },
        })
    }
}

fn regex_check(pattern: &str) -> Result<(), String> {
    server_status::MonitorConfig::new(Duration::from_secs(1), Duration::from_secs(1), &[pattern.to_string()])
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let portal = config.to_portal_config().unwrap();
        assert_eq!(portal.bind_address.port(), 3001);
        assert_eq!(portal.auth.token_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(portal.auth.otp_ttl, Duration::from_secs(600));
        assert_eq!(portal.status.poll_interval, Some(Duration::from_secs(60)));
        assert_eq!(portal.database_path, Some(PathBuf::from("data/portal.db")));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.otp_ttl_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.status.internal_hosts = vec!["(".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_database_and_disabled_polling() {
        let mut config = AppConfig::default();
        config.database.path = ":memory:".to_string();
        config.status.poll_interval_secs = 0;

        let portal = config.to_portal_config().unwrap();
        assert_eq!(portal.database_path, None);
        assert_eq!(portal.status.poll_interval, None);
    }

    #[test]
    fn environment_overrides_secrets() {
        let env: HashMap<&str, &str> = [
            (ENV_JWT_SECRET, "from-env"),
            (ENV_SMTP_PASSWORD, "smtp-secret"),
            (ENV_MEMBERSHIP_CSV, ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.mail.smtp_password.as_deref(), Some("smtp-secret"));
        // Empty values leave the file's setting alone.
        assert_eq!(config.membership.csv_paths.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("portal.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:3001");
        assert!(path.exists());

        // The written file loads back to the same values.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.auth.token_ttl_hours, 24);
        assert_eq!(reloaded.status.internal_hosts, config.status.internal_hosts);
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portal.toml");
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:8080"
plugin_default_server_id = "smp"

[mail]
smtp_host = "smtp.example.org"
smtp_port = 465

[logging]
level = "debug"
json_format = true
"#;
        tokio::fs::write(&path, toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.plugin_default_server_id.as_deref(), Some("smp"));
        assert_eq!(config.server.frontend_url, "http://localhost:5173");
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.auth.otp_ttl_minutes, 10);
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }
}
