//! Validated notification channel configuration.
//!
//! Raw settings from the config file are checked once at load time and
//! turned into [`ChannelConfig`] variants. Every enabled variant carries
//! non-empty credentials; an entry that was present but incomplete becomes
//! [`ChannelConfig::Disabled`] and is never dispatched to.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-request timeout for outbound notification calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net";
pub const DEFAULT_SENDGRID_API_BASE: &str = "https://api.sendgrid.com";
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
pub const DEFAULT_TEXTBELT_API_BASE: &str = "https://textbelt.com";
/// Textbelt's shared free-tier key.
pub const DEFAULT_TEXTBELT_KEY: &str = "textbelt";
/// Display name used for the Discord webhook user and the Mailgun sender.
pub const DEFAULT_SENDER_NAME: &str = "Website Monitor";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// The transport a channel delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Discord,
    Telegram,
    Mailgun,
    Slack,
    Webhook,
    Smtp,
    Sendgrid,
    Twilio,
    Textbelt,
}

impl ChannelKind {
    /// Every kind, in dispatch order.
    pub const ALL: [ChannelKind; 9] = [
        ChannelKind::Discord,
        ChannelKind::Telegram,
        ChannelKind::Mailgun,
        ChannelKind::Slack,
        ChannelKind::Webhook,
        ChannelKind::Smtp,
        ChannelKind::Sendgrid,
        ChannelKind::Twilio,
        ChannelKind::Textbelt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Discord => "discord",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Mailgun => "mailgun",
            ChannelKind::Slack => "slack",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Smtp => "smtp",
            ChannelKind::Sendgrid => "sendgrid",
            ChannelKind::Twilio => "twilio",
            ChannelKind::Textbelt => "textbelt",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordChannel {
    pub webhook_url: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramChannel {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailgunChannel {
    pub domain: String,
    pub api_key: String,
    pub to_email: String,
    /// Sender mailbox. Defaults to `Website Monitor <mailgun@{domain}>`.
    pub from_email: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackChannel {
    pub webhook_url: String,
}

/// Generic JSON webhook.
///
/// `url` and header values may contain `${VAR}` references; they are
/// resolved when the notifier is built, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookChannel {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub source_url: Option<String>,
    pub body_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpChannel {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub from_email: String,
    pub to_email: String,
    pub tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendgridChannel {
    pub api_key: String,
    pub from_email: String,
    pub to_email: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioChannel {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextbeltChannel {
    pub to_number: String,
    pub api_key: String,
    pub api_base: String,
}

/// One configured notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelConfig {
    Discord(DiscordChannel),
    Telegram(TelegramChannel),
    Mailgun(MailgunChannel),
    Slack(SlackChannel),
    Webhook(WebhookChannel),
    Smtp(SmtpChannel),
    Sendgrid(SendgridChannel),
    Twilio(TwilioChannel),
    Textbelt(TextbeltChannel),
    /// Present in the configuration but missing required fields.
    Disabled {
        kind: ChannelKind,
        missing: Vec<&'static str>,
    },
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelConfig::Discord(_) => ChannelKind::Discord,
            ChannelConfig::Telegram(_) => ChannelKind::Telegram,
            ChannelConfig::Mailgun(_) => ChannelKind::Mailgun,
            ChannelConfig::Slack(_) => ChannelKind::Slack,
            ChannelConfig::Webhook(_) => ChannelKind::Webhook,
            ChannelConfig::Smtp(_) => ChannelKind::Smtp,
            ChannelConfig::Sendgrid(_) => ChannelKind::Sendgrid,
            ChannelConfig::Twilio(_) => ChannelKind::Twilio,
            ChannelConfig::Textbelt(_) => ChannelKind::Textbelt,
            ChannelConfig::Disabled { kind, .. } => *kind,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, ChannelConfig::Disabled { .. })
    }
}

/// Ordered channel list plus dispatch settings, validated once at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub channels: Vec<ChannelConfig>,
    pub timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl NotificationConfig {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Channels that will actually be dispatched to, in configuration order.
    pub fn enabled(&self) -> impl Iterator<Item = &ChannelConfig> {
        self.channels.iter().filter(|c| c.is_enabled())
    }

    pub fn enabled_kinds(&self) -> Vec<ChannelKind> {
        self.enabled().map(ChannelConfig::kind).collect()
    }

    /// One-word state of a channel: `enabled`, `skipped (missing: ...)`,
    /// or `(none)` when the config has no section for it.
    pub fn status(&self, kind: ChannelKind) -> String {
        match self.channels.iter().find(|c| c.kind() == kind) {
            None => "(none)".to_string(),
            Some(ChannelConfig::Disabled { missing, .. }) => {
                format!("skipped (missing: {})", missing.join(", "))
            }
            Some(_) => "enabled".to_string(),
        }
    }

    /// Print the resolved channel states for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Notification config loaded:");
        tracing::info!("  {:<12} {}s", "timeout:", self.timeout.as_secs());
        for kind in ChannelKind::ALL {
            let label = format!("{kind}:");
            tracing::info!("  {:<12} {}", label, self.status(kind));
        }
    }
}
