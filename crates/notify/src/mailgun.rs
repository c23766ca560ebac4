//! Mailgun HTTP API notifier.

use pagewatch_core::{ChannelKind, MailgunChannel};

use crate::http::{ensure_success, parse_url};
use crate::traits::{AlertEvent, Notifier, NotifyError};

/// Sends alerts as plain-text email through Mailgun's `messages` endpoint.
#[derive(Debug)]
pub struct MailgunNotifier {
    endpoint: reqwest::Url,
    api_key: String,
    from: String,
    to: String,
    client: reqwest::Client,
}

impl MailgunNotifier {
    pub fn new(channel: &MailgunChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        if channel.domain.contains('/') {
            return Err(NotifyError::Config(format!(
                "invalid Mailgun domain '{}'",
                channel.domain
            )));
        }
        let raw = format!(
            "{}/v3/{}/messages",
            channel.api_base.trim_end_matches('/'),
            channel.domain
        );

        Ok(Self {
            endpoint: parse_url("Mailgun api_base", &raw)?,
            api_key: channel.api_key.clone(),
            from: channel.from_email.clone(),
            to: channel.to_email.clone(),
            client,
        })
    }

    /// Form fields: title as subject, body as text.
    pub fn form<'a>(&'a self, event: &'a AlertEvent) -> [(&'static str, &'a str); 4] {
        [
            ("from", self.from.as_str()),
            ("to", self.to.as_str()),
            ("subject", event.title.as_str()),
            ("text", event.body.as_str()),
        ]
    }
}

#[async_trait::async_trait]
impl Notifier for MailgunNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth("api", Some(&self.api_key))
            .form(&self.form(event))
            .send()
            .await?;

        let status = ensure_success(ChannelKind::Mailgun, response).await?;
        tracing::debug!(%status, to = %self.to, "Mailgun accepted message");
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Mailgun
    }
}
