//! Slack incoming-webhook notifier.

use pagewatch_core::{ChannelKind, SlackChannel};

use crate::http::{ensure_success, parse_url};
use crate::traits::{truncate_chars, AlertEvent, Notifier, NotifyError};

/// Slack rejects section text longer than this with `invalid_blocks`.
const MAX_SECTION: usize = 3_000;

#[derive(Debug)]
pub struct SlackNotifier {
    webhook_url: reqwest::Url,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(channel: &SlackChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: parse_url("Slack webhook_url", &channel.webhook_url)?,
            client,
        })
    }

    /// `text` is the fallback shown in notifications; the block carries the body.
    pub fn payload(event: &AlertEvent) -> serde_json::Value {
        serde_json::json!({
            "text": event.title,
            "blocks": [{
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": truncate_chars(
                        &format!("*{}*\n\n{}", event.title, event.body),
                        MAX_SECTION,
                    ),
                },
            }],
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&Self::payload(event))
            .send()
            .await?;
        ensure_success(ChannelKind::Slack, response).await?;
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }
}
