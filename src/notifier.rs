//! Report delivery by email

use crate::config::SmtpSettings;
use crate::error::{Error, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::future::Future;
use tracing::info;

/// Plain-text part for clients that do not render HTML
const PLAIN_TEXT_FALLBACK: &str = "This report is HTML; open it in an HTML mail client.";

/// Delivers a finished report
pub trait Notifier {
    /// Send an HTML document with the given subject
    fn send(&self, subject: &str, html: &str) -> impl Future<Output = Result<()>> + Send;
}

/// SMTP delivery over a STARTTLS-upgraded, authenticated session
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    settings: SmtpSettings,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Create a notifier sending to `recipients`
    pub fn new(settings: SmtpSettings, recipients: Vec<Mailbox>) -> Self {
        Self {
            settings,
            recipients,
        }
    }

    /// Build the report message
    pub fn build_message(&self, subject: &str, html: &str) -> Result<Message> {
        let from = self
            .settings
            .from
            .as_deref()
            .ok_or_else(|| Error::Mail("sender address (EMAIL_ADDRESS) not configured".into()))?
            .parse::<Mailbox>()
            .map_err(|e| Error::InvalidAddress(e.to_string()))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                format!("{}\n\n{}", subject, PLAIN_TEXT_FALLBACK),
                html.to_string(),
            ))
            .map_err(|e| Error::Mail(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let missing = |name: &str| Error::Mail(format!("{} not configured", name));
        let server = self.settings.server.as_deref().ok_or_else(|| missing("SMTP_SERVER"))?;
        let user = self.settings.user.clone().ok_or_else(|| missing("SMTP_USER"))?;
        let password = self
            .settings
            .password
            .clone()
            .ok_or_else(|| missing("SMTP_PASSWORD"))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
            .map_err(|e| Error::Mail(e.to_string()))?
            .port(self.settings.port)
            .credentials(Credentials::new(user, password))
            .build();
        Ok(transport)
    }
}

impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, html: &str) -> Result<()> {
        let message = self.build_message(subject, html)?;
        let transport = self.transport()?;
        transport
            .send(message)
            .await
            .map_err(|e| Error::Mail(e.to_string()))?;
        info!("Email sent successfully");
        Ok(())
    }
}
