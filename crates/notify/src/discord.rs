//! Discord webhook notifier.
//!
//! Posts the alert as a `content` message plus one red embed carrying the
//! body. Discord answers `204 No Content` on success.

use pagewatch_core::{ChannelKind, DiscordChannel};

use crate::http::{ensure_success, parse_url};
use crate::traits::{truncate_chars, AlertEvent, Notifier, NotifyError};

/// Discord rejects message content longer than this.
const MAX_CONTENT: usize = 2_000;
const MAX_EMBED_TITLE: usize = 256;
const MAX_EMBED_DESCRIPTION: usize = 4_096;
const EMBED_COLOR: u32 = 0xFF0000;

#[derive(Debug)]
pub struct DiscordNotifier {
    webhook_url: reqwest::Url,
    username: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(channel: &DiscordChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: parse_url("Discord webhook_url", &channel.webhook_url)?,
            username: channel.username.clone(),
            client,
        })
    }

    /// Webhook body. Mentions are disabled so page text cannot ping `@everyone`.
    pub fn payload(&self, event: &AlertEvent) -> serde_json::Value {
        serde_json::json!({
            "content": message_content(event),
            "username": self.username,
            "embeds": [{
                "title": truncate_chars(&event.title, MAX_EMBED_TITLE),
                "description": truncate_chars(&event.body, MAX_EMBED_DESCRIPTION),
                "color": EMBED_COLOR,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }],
            "allowed_mentions": { "parse": [] },
        })
    }
}

/// Title and body combined into one text field.
pub fn message_content(event: &AlertEvent) -> String {
    truncate_chars(&format!("**{}**\n\n{}", event.title, event.body), MAX_CONTENT)
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&self.payload(event))
            .send()
            .await?;

        let status = ensure_success(ChannelKind::Discord, response).await?;
        tracing::debug!(%status, "discord webhook accepted message");
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Discord
    }
}
