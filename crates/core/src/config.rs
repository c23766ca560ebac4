use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::*;
use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Trimmed value of an optional field, `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required(value: &Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match present(value) {
        Some(v) => v.to_string(),
        None => {
            missing.push(name);
            String::new()
        }
    }
}

fn disabled(kind: ChannelKind, missing: Vec<&'static str>) -> ChannelConfig {
    tracing::warn!(channel = %kind, ?missing, "notification channel incomplete, skipping");
    ChannelConfig::Disabled { kind, missing }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub templates: TemplateSettings,
}

impl Config {
    /// Parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Load the config file if it exists, then apply environment overrides
    /// (call `load_dotenv()` first).
    ///
    /// A missing file is not an error: the process may be configured
    /// entirely from the environment. A file that exists but fails to parse
    /// is.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let config = Self::from_file(path)?;
            tracing::info!(path = %path.display(), "loaded config file");
            config
        } else {
            tracing::info!(path = %path.display(), "config file not found, using environment only");
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(env_opt)
    }

    /// Override channel settings from environment-style lookups.
    ///
    /// A channel is replaced only when every variable it needs is set;
    /// channels not described by the environment keep their file values.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let n = &mut self.notifications;

        if let Some(webhook_url) = lookup("DISCORD_WEBHOOK_URL") {
            let username = n.discord.as_ref().and_then(|d| d.username.clone());
            n.discord = Some(DiscordSettings {
                webhook_url: Some(webhook_url),
                username,
            });
        }

        if let (Some(bot_token), Some(chat_id)) =
            (lookup("TELEGRAM_BOT_TOKEN"), lookup("TELEGRAM_CHAT_ID"))
        {
            let api_base = n.telegram.as_ref().and_then(|t| t.api_base.clone());
            n.telegram = Some(TelegramSettings {
                bot_token: Some(bot_token),
                chat_id: Some(chat_id),
                api_base,
            });
        }

        if let (Some(domain), Some(api_key), Some(to_email)) = (
            lookup("MAILGUN_DOMAIN"),
            lookup("MAILGUN_API_KEY"),
            lookup("MAILGUN_TO_EMAIL"),
        ) {
            let (from_email, api_base) = n
                .mailgun
                .as_ref()
                .map(|m| (m.from_email.clone(), m.api_base.clone()))
                .unwrap_or_default();
            n.mailgun = Some(MailgunSettings {
                domain: Some(domain),
                api_key: Some(api_key),
                to_email: Some(to_email),
                from_email,
                api_base,
            });
        }

        if let Some(webhook_url) = lookup("SLACK_WEBHOOK_URL") {
            n.slack = Some(SlackSettings {
                webhook_url: Some(webhook_url),
            });
        }

        if let (Some(account_sid), Some(auth_token), Some(from_number), Some(to_number)) = (
            lookup("TWILIO_ACCOUNT_SID"),
            lookup("TWILIO_AUTH_TOKEN"),
            lookup("TWILIO_FROM_NUMBER"),
            lookup("TWILIO_TO_NUMBER"),
        ) {
            let api_base = n.twilio.as_ref().and_then(|t| t.api_base.clone());
            n.twilio = Some(TwilioSettings {
                account_sid: Some(account_sid),
                auth_token: Some(auth_token),
                from_number: Some(from_number),
                to_number: Some(to_number),
                api_base,
            });
        }

        if let Some(to_number) = lookup("TEXTBELT_TO_NUMBER") {
            let api_base = n.textbelt.as_ref().and_then(|t| t.api_base.clone());
            n.textbelt = Some(TextbeltSettings {
                to_number: Some(to_number),
                api_key: lookup("TEXTBELT_API_KEY"),
                api_base,
            });
        }

        if let Some(raw) = lookup("NOTIFY_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "NOTIFY_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?;
            n.timeout_secs = Some(secs);
        }

        Ok(())
    }

    /// Validate channel settings into the dispatchable form.
    pub fn notification_config(&self) -> Result<NotificationConfig, ConfigError> {
        self.notifications.resolve()
    }

    /// Return a redacted view with no secrets.
    pub fn redacted_summary(&self) -> serde_json::Value {
        let n = &self.notifications;
        serde_json::json!({
            "timeout_secs": n.timeout_secs.unwrap_or(DEFAULT_TIMEOUT.as_secs()),
            "discord": { "configured": n.discord.is_some() },
            "telegram": {
                "configured": n.telegram.is_some(),
                "chat_id": n.telegram.as_ref().and_then(|t| t.chat_id.clone()),
            },
            "mailgun": {
                "configured": n.mailgun.is_some(),
                "domain": n.mailgun.as_ref().and_then(|m| m.domain.clone()),
                "to_email": n.mailgun.as_ref().and_then(|m| m.to_email.clone()),
            },
            "slack": { "configured": n.slack.is_some() },
            "webhook": { "configured": n.webhook.is_some() },
            "smtp": {
                "configured": n.smtp.is_some(),
                "host": n.smtp.as_ref().and_then(|s| s.host.clone()),
            },
            "sendgrid": {
                "configured": n.sendgrid.is_some(),
                "to_email": n.sendgrid.as_ref().and_then(|s| s.to_email.clone()),
            },
            "twilio": {
                "configured": n.twilio.is_some(),
                "to_number": n.twilio.as_ref().and_then(|t| t.to_number.clone()),
            },
            "textbelt": {
                "configured": n.textbelt.is_some(),
                "to_number": n.textbelt.as_ref().and_then(|t| t.to_number.clone()),
            },
        })
    }
}

// ── Notifications ─────────────────────────────────────────────

/// Raw `notifications` section, as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub discord: Option<DiscordSettings>,
    #[serde(default)]
    pub telegram: Option<TelegramSettings>,
    #[serde(default)]
    pub mailgun: Option<MailgunSettings>,
    #[serde(default)]
    pub slack: Option<SlackSettings>,
    #[serde(default)]
    pub webhook: Option<WebhookSettings>,
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
    #[serde(default)]
    pub sendgrid: Option<SendgridSettings>,
    #[serde(default)]
    pub twilio: Option<TwilioSettings>,
    #[serde(default)]
    pub textbelt: Option<TextbeltSettings>,
}

impl NotificationSettings {
    /// Channels come out in declaration order: discord, telegram, mailgun,
    /// slack, webhook, smtp, sendgrid, twilio, textbelt. Absent sections
    /// produce no entry at all.
    pub fn resolve(&self) -> Result<NotificationConfig, ConfigError> {
        let timeout = match self.timeout_secs {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "notifications.timeout_secs".to_string(),
                    value: "0".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        let channels = [
            self.discord.as_ref().map(DiscordSettings::resolve),
            self.telegram.as_ref().map(TelegramSettings::resolve),
            self.mailgun.as_ref().map(MailgunSettings::resolve),
            self.slack.as_ref().map(SlackSettings::resolve),
            self.webhook.as_ref().map(WebhookSettings::resolve),
            self.smtp.as_ref().map(SmtpSettings::resolve),
            self.sendgrid.as_ref().map(SendgridSettings::resolve),
            self.twilio.as_ref().map(TwilioSettings::resolve),
            self.textbelt.as_ref().map(TextbeltSettings::resolve),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(NotificationConfig { channels, timeout })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl DiscordSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let webhook_url = required(&self.webhook_url, "webhook_url", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Discord, missing);
        }
        ChannelConfig::Discord(DiscordChannel {
            webhook_url,
            username: present(&self.username)
                .unwrap_or(DEFAULT_SENDER_NAME)
                .to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl TelegramSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let bot_token = required(&self.bot_token, "bot_token", &mut missing);
        let chat_id = required(&self.chat_id, "chat_id", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Telegram, missing);
        }
        ChannelConfig::Telegram(TelegramChannel {
            bot_token,
            chat_id,
            api_base: api_base(&self.api_base, DEFAULT_TELEGRAM_API_BASE),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailgunSettings {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub to_email: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl MailgunSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let domain = required(&self.domain, "domain", &mut missing);
        let api_key = required(&self.api_key, "api_key", &mut missing);
        let to_email = required(&self.to_email, "to_email", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Mailgun, missing);
        }
        let from_email = present(&self.from_email)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{DEFAULT_SENDER_NAME} <mailgun@{domain}>"));
        ChannelConfig::Mailgun(MailgunChannel {
            domain,
            api_key,
            to_email,
            from_email,
            api_base: api_base(&self.api_base, DEFAULT_MAILGUN_API_BASE),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl SlackSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let webhook_url = required(&self.webhook_url, "webhook_url", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Slack, missing);
        }
        ChannelConfig::Slack(SlackChannel { webhook_url })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub body_template: Option<String>,
}

impl WebhookSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let url = required(&self.url, "url", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Webhook, missing);
        }
        ChannelConfig::Webhook(WebhookChannel {
            url,
            headers: self.headers.clone(),
            source_url: present(&self.source_url).map(str::to_string),
            body_template: present(&self.body_template).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub to_email: Option<String>,
    #[serde(default)]
    pub tls: Option<bool>,
}

impl SmtpSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let host = required(&self.host, "host", &mut missing);
        let from_email = required(&self.from_email, "from_email", &mut missing);
        let to_email = required(&self.to_email, "to_email", &mut missing);

        // Credentials are optional, but half a pair is incomplete.
        let credentials = match (present(&self.username), present(&self.password)) {
            (Some(user), Some(pass)) => Some((user.to_string(), pass.to_string())),
            (Some(_), None) => {
                missing.push("password");
                None
            }
            (None, Some(_)) => {
                missing.push("username");
                None
            }
            (None, None) => None,
        };

        if !missing.is_empty() {
            return disabled(ChannelKind::Smtp, missing);
        }
        ChannelConfig::Smtp(SmtpChannel {
            host,
            port: self.port.unwrap_or(DEFAULT_SMTP_PORT),
            credentials,
            from_email,
            to_email,
            tls: self.tls.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendgridSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub to_email: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl SendgridSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let api_key = required(&self.api_key, "api_key", &mut missing);
        let from_email = required(&self.from_email, "from_email", &mut missing);
        let to_email = required(&self.to_email, "to_email", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Sendgrid, missing);
        }
        ChannelConfig::Sendgrid(SendgridChannel {
            api_key,
            from_email,
            to_email,
            api_base: api_base(&self.api_base, DEFAULT_SENDGRID_API_BASE),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioSettings {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub from_number: Option<String>,
    #[serde(default)]
    pub to_number: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl TwilioSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let account_sid = required(&self.account_sid, "account_sid", &mut missing);
        let auth_token = required(&self.auth_token, "auth_token", &mut missing);
        let from_number = required(&self.from_number, "from_number", &mut missing);
        let to_number = required(&self.to_number, "to_number", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Twilio, missing);
        }
        ChannelConfig::Twilio(TwilioChannel {
            account_sid,
            auth_token,
            from_number,
            to_number,
            api_base: api_base(&self.api_base, DEFAULT_TWILIO_API_BASE),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextbeltSettings {
    #[serde(default)]
    pub to_number: Option<String>,
    /// Falls back to the free-tier key.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl TextbeltSettings {
    fn resolve(&self) -> ChannelConfig {
        let mut missing = Vec::new();
        let to_number = required(&self.to_number, "to_number", &mut missing);
        if !missing.is_empty() {
            return disabled(ChannelKind::Textbelt, missing);
        }
        ChannelConfig::Textbelt(TextbeltChannel {
            to_number,
            api_key: present(&self.api_key)
                .unwrap_or(DEFAULT_TEXTBELT_KEY)
                .to_string(),
            api_base: api_base(&self.api_base, DEFAULT_TEXTBELT_API_BASE),
        })
    }
}

fn api_base(value: &Option<String>, default: &str) -> String {
    present(value)
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

// ── Alert templates ───────────────────────────────────────────

/// Optional overrides for the alert subject/body templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSettings {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}
