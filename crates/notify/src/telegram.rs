//! Telegram Bot API notifier with MarkdownV2 formatting.
//!
//! Delivers alerts via the Telegram Bot API `sendMessage` endpoint.
//! Success is judged by the `ok` flag in the response body, not the
//! HTTP status alone.

use pagewatch_core::{ChannelKind, TelegramChannel};

use crate::http::{error_detail, parse_url};
use crate::traits::{truncate_chars, AlertEvent, Notifier, NotifyError};

/// Telegram rejects message text longer than this.
const MAX_TEXT: usize = 4_096;
const MAX_TITLE: usize = 256;

/// Escapes special characters for Telegram MarkdownV2 parse mode.
///
/// Telegram requires these characters to be escaped with a preceding backslash
/// when using MarkdownV2: `_`, `*`, `[`, `]`, `(`, `)`, `~`, `` ` ``, `>`,
/// `#`, `+`, `-`, `=`, `|`, `{`, `}`, `.`, `!`, and `\` itself.
pub fn escape_markdown_v2(text: &str) -> String {
    let special = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
        '\\',
    ];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if special.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

/// Bold title, blank line, body; escaped and cut to Telegram's limit.
pub fn message_text(event: &AlertEvent) -> String {
    let title = escape_markdown_v2(&truncate_chars(&event.title, MAX_TITLE));
    let body = escape_markdown_v2(&event.body);
    let text = format!("*{title}*\n\n{body}");

    if text.chars().count() <= MAX_TEXT {
        return text;
    }

    let mut cut: String = text.chars().take(MAX_TEXT - 1).collect();
    // Never leave a dangling escape backslash at the cut.
    let trailing = cut.chars().rev().take_while(|c| *c == '\\').count();
    if trailing % 2 == 1 {
        cut.pop();
    }
    cut.push('…');
    cut
}

/// Sends alerts via the Telegram Bot API.
#[derive(Debug)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(channel: &TelegramChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        parse_url("Telegram api_base", &channel.api_base)?;
        if channel.bot_token.contains('/') {
            return Err(NotifyError::Config(
                "Telegram bot token must not contain '/'".to_string(),
            ));
        }

        Ok(Self {
            bot_token: channel.bot_token.clone(),
            chat_id: channel.chat_id.clone(),
            api_base: channel.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    pub fn payload(&self, event: &AlertEvent) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": message_text(event),
            "parse_mode": "MarkdownV2",
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        tracing::debug!(chat_id = %self.chat_id, "sending Telegram notification");

        let response = self
            .client
            .post(self.endpoint())
            .json(&self.payload(event))
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let resp_body: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => {
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    detail: error_detail(&raw),
                })
            }
        };

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::debug!(chat_id = %self.chat_id, "Telegram accepted message");
            return Ok(());
        }

        // Handle rate limiting (HTTP 429).
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");

        Err(NotifyError::Rejected {
            status: status.as_u16(),
            detail: description.to_string(),
        })
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }
}
