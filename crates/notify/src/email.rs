//! SMTP email notifier via `lettre` with TLS support.
//!
//! Delivers alerts as plain-text emails through an SMTP server
//! (Gmail app passwords, Mailtrap and similar relays).
//! Port 465 uses implicit TLS; other ports use STARTTLS when TLS is on.

use std::time::Duration;

use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use pagewatch_core::{ChannelKind, SmtpChannel};

use crate::traits::{AlertEvent, Notifier, NotifyError};

/// Sends alerts as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// Build the transport. No connection is opened here.
    pub fn new(channel: &SmtpChannel, timeout: Duration) -> Result<Self, NotifyError> {
        let from: Mailbox = channel
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("from_email: {e}")))?;
        let to: Mailbox = channel
            .to_email
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("to_email: {e}")))?;

        let builder = if channel.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&channel.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
        } else if channel.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&channel.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&channel.host)
        };
        let mut builder = builder.port(channel.port).timeout(Some(timeout));

        if let Some((username, password)) = &channel.credentials {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Build the message: title as subject, body as plain text.
    pub fn message(&self, event: &AlertEvent) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(event.title.as_str())
            .body(event.body.clone())
            .map_err(|e| NotifyError::Config(format!("failed to build email: {e}")))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let email = self.message(event)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::debug!(to = %self.to, "SMTP server accepted message");
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Smtp
    }
}
