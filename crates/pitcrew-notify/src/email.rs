//! SMTP delivery — the production [`Mailer`] implementation (async lettre).

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use pitcrew_core::config::SmtpConfig;
use pitcrew_core::error::{PitcrewError, Result};
use pitcrew_core::traits::{EmailMessage, Mailer};

/// Sends notification emails over SMTP with STARTTLS.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let from_name = self.config.display_name.as_deref().unwrap_or("Pitcrew");
        let from_mailbox: Mailbox = format!("{from_name} <{}>", self.config.from_address)
            .parse()
            .map_err(|e| PitcrewError::Mail(format!("Invalid from: {e}")))?;
        let to_mailbox: Mailbox = message
            .to
            .parse()
            .map_err(|e| PitcrewError::Mail(format!("Invalid to: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| PitcrewError::Mail(format!("Build email: {e}")))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| PitcrewError::Mail(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| PitcrewError::Mail(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {}", message.to);
        Ok(())
    }
}
