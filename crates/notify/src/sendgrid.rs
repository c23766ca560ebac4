//! SendGrid v3 mail-send notifier.

use pagewatch_core::{ChannelKind, SendgridChannel};

use crate::http::{ensure_success, parse_url};
use crate::traits::{AlertEvent, Notifier, NotifyError};

/// Sends alerts as plain-text email through SendGrid. The API answers
/// `202 Accepted` on success.
#[derive(Debug)]
pub struct SendgridNotifier {
    endpoint: reqwest::Url,
    api_key: String,
    from: String,
    to: String,
    client: reqwest::Client,
}

impl SendgridNotifier {
    pub fn new(channel: &SendgridChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        let raw = format!("{}/v3/mail/send", channel.api_base.trim_end_matches('/'));
        Ok(Self {
            endpoint: parse_url("SendGrid api_base", &raw)?,
            api_key: channel.api_key.clone(),
            from: channel.from_email.clone(),
            to: channel.to_email.clone(),
            client,
        })
    }

    pub fn payload(&self, event: &AlertEvent) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{ "to": [{ "email": self.to }] }],
            "from": { "email": self.from },
            "subject": event.title,
            "content": [{ "type": "text/plain", "value": event.body }],
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SendgridNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&self.payload(event))
            .send()
            .await?;

        let status = ensure_success(ChannelKind::Sendgrid, response).await?;
        tracing::debug!(%status, to = %self.to, "SendGrid accepted message");
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sendgrid
    }
}
