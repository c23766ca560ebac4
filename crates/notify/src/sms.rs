//! SMS notifiers: Twilio and Textbelt.
//!
//! Only the alert body is texted, cut to fit a single SMS segment.

use pagewatch_core::{ChannelKind, TextbeltChannel, TwilioChannel};

use crate::http::{ensure_success, error_detail, parse_url};
use crate::traits::{AlertEvent, Notifier, NotifyError};

/// Body characters kept before the `...` marker; leaves room in a
/// 160-character segment.
const MAX_SMS_BODY: usize = 150;

/// Alert body for SMS: the first 150 characters plus `...` when longer.
pub fn sms_text(event: &AlertEvent) -> String {
    if event.body.chars().count() <= MAX_SMS_BODY {
        return event.body.clone();
    }
    let mut text: String = event.body.chars().take(MAX_SMS_BODY).collect();
    text.push_str("...");
    text
}

// ── Twilio ──────────────────────────────────────────────────────────

/// Sends alerts through Twilio's Messages resource. Success is `201 Created`.
#[derive(Debug)]
pub struct TwilioNotifier {
    endpoint: reqwest::Url,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
    client: reqwest::Client,
}

impl TwilioNotifier {
    pub fn new(channel: &TwilioChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        if channel.account_sid.contains('/') {
            return Err(NotifyError::Config(format!(
                "invalid Twilio account_sid '{}'",
                channel.account_sid
            )));
        }
        let raw = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            channel.api_base.trim_end_matches('/'),
            channel.account_sid
        );

        Ok(Self {
            endpoint: parse_url("Twilio api_base", &raw)?,
            account_sid: channel.account_sid.clone(),
            auth_token: channel.auth_token.clone(),
            from: channel.from_number.clone(),
            to: channel.to_number.clone(),
            client,
        })
    }

    pub fn form(&self, event: &AlertEvent) -> [(&'static str, String); 3] {
        [
            ("From", self.from.clone()),
            ("To", self.to.clone()),
            ("Body", sms_text(event)),
        ]
    }
}

#[async_trait::async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form(event))
            .send()
            .await?;

        let status = ensure_success(ChannelKind::Twilio, response).await?;
        tracing::debug!(%status, to = %self.to, "Twilio accepted message");
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Twilio
    }
}

// ── Textbelt ────────────────────────────────────────────────────────

/// Sends alerts through Textbelt. Success is judged by the `success` flag
/// in the response body.
#[derive(Debug)]
pub struct TextbeltNotifier {
    endpoint: reqwest::Url,
    to: String,
    api_key: String,
    client: reqwest::Client,
}

impl TextbeltNotifier {
    pub fn new(channel: &TextbeltChannel, client: reqwest::Client) -> Result<Self, NotifyError> {
        let raw = format!("{}/text", channel.api_base.trim_end_matches('/'));
        Ok(Self {
            endpoint: parse_url("Textbelt api_base", &raw)?,
            to: channel.to_number.clone(),
            api_key: channel.api_key.clone(),
            client,
        })
    }

    pub fn form(&self, event: &AlertEvent) -> [(&'static str, String); 3] {
        [
            ("phone", self.to.clone()),
            ("message", sms_text(event)),
            ("key", self.api_key.clone()),
        ]
    }
}

#[async_trait::async_trait]
impl Notifier for TextbeltNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&self.form(event))
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let body: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => {
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    detail: error_detail(&raw),
                })
            }
        };

        if body.get("success") == Some(&serde_json::Value::Bool(true)) {
            tracing::debug!(
                text_id = ?body.get("textId"),
                quota_remaining = ?body.get("quotaRemaining"),
                "Textbelt accepted message"
            );
            return Ok(());
        }

        let error = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Textbelt error");
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            detail: error.to_string(),
        })
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Textbelt
    }
}
