//! Outgoing email.
//!
//! [`SmtpMailer`] delivers through a real relay. [`LogMailer`] stands in when
//! no relay is configured (or it points at localhost): messages are logged and
//! one-time codes are handed back to the client as a preview.

mod smtp;
pub mod templates;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;

pub use smtp::SmtpMailer;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;

    /// True when messages are not actually delivered.
    fn is_preview(&self) -> bool;
}

/// Logs messages instead of sending them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(
            to = %mail.to.join(", "),
            subject = %mail.subject,
            "📧 Mail not delivered (preview transport)"
        );
        Ok(())
    }

    fn is_preview(&self) -> bool {
        true
    }
}

/// True when `host` means "no real relay".
pub fn is_preview_host(host: Option<&str>) -> bool {
    match host.map(str::trim) {
        None | Some("") => true,
        Some(host) => host == "localhost" || host == "127.0.0.1",
    }
}

/// Picks the transport for `config`.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.smtp_host.as_deref() {
        Some(host) if !is_preview_host(Some(host)) => {
            info!("📧 Sending mail through {}:{}", host, config.smtp_port);
            Ok(Arc::new(SmtpMailer::new(config, host)?))
        }
        _ => {
            info!("📧 No SMTP relay configured, mail is logged only");
            Ok(Arc::new(LogMailer))
        }
    }
}
