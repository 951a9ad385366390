use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{MailError, Mailer, OutgoingMail};
use crate::config::MailConfig;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Delivers through an SMTP relay.
///
/// Port 465 uses implicit TLS, every other port STARTTLS. Credentials are
/// sent only when both user and password are set and neither is `none`.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self, MailError> {
        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let builder = builder.port(config.smtp_port);

        let credentials = match (config.smtp_user.as_deref(), config.smtp_password.as_deref()) {
            (Some(user), Some(password)) if user != "none" && password != "none" => {
                Some(Credentials::new(user.to_string(), password.to_string()))
            }
            _ => None,
        };
        let builder = match credentials {
            Some(credentials) => builder.credentials(credentials),
            None => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &mail.to {
            builder = builder.to(recipient.parse()?);
        }
        let message = builder.body(mail.html)?;

        self.transport.send(message).await?;
        debug!("Delivered mail to {}", mail.to.join(", "));
        Ok(())
    }

    fn is_preview(&self) -> bool {
        false
    }
}
