//! Fans one alert out to every enabled channel.
//!
//! Channels are attempted concurrently and independently: a failure,
//! rejection or timeout on one channel is recorded in its
//! [`DispatchResult`] and never stops the others. Results come back in
//! configuration order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use pagewatch_core::{ChannelConfig, ChannelKind, NotificationConfig};
use serde::Serialize;

use crate::discord::DiscordNotifier;
use crate::email::EmailNotifier;
use crate::mailgun::MailgunNotifier;
use crate::sendgrid::SendgridNotifier;
use crate::slack::SlackNotifier;
use crate::sms::{TextbeltNotifier, TwilioNotifier};
use crate::telegram::TelegramNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{AlertEvent, DispatchResult, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// An enabled channel, or the reason its notifier could not be built.
enum Slot {
    Ready(Box<dyn Notifier>),
    Invalid { kind: ChannelKind, reason: String },
}

impl Slot {
    fn kind(&self) -> ChannelKind {
        match self {
            Slot::Ready(notifier) => notifier.kind(),
            Slot::Invalid { kind, .. } => *kind,
        }
    }
}

fn boxed<N: Notifier + 'static>(notifier: N) -> Box<dyn Notifier> {
    Box::new(notifier)
}

/// Delivers alerts to a fixed set of channels.
pub struct NotificationManager {
    slots: Vec<Slot>,
    timeout: Duration,
}

impl NotificationManager {
    /// Build notifiers for every enabled channel. No network calls happen here.
    ///
    /// Disabled entries are skipped. A channel whose notifier cannot be
    /// built (bad address, unresolved `${VAR}`) is kept and reported as a
    /// failure on every broadcast. The only error returned is failure to
    /// build the HTTP client.
    pub fn configure(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        let renderer = Arc::new(TemplateRenderer::new());

        let slots = config
            .enabled()
            .filter_map(|channel| {
                let built: Result<Box<dyn Notifier>, NotifyError> = match channel {
                    ChannelConfig::Discord(c) => {
                        DiscordNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Telegram(c) => {
                        TelegramNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Mailgun(c) => {
                        MailgunNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Slack(c) => {
                        SlackNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Webhook(c) => {
                        WebhookNotifier::new(c, renderer.clone(), client.clone())
                            .map(boxed)
                    }
                    ChannelConfig::Smtp(c) => {
                        EmailNotifier::new(c, config.timeout).map(boxed)
                    }
                    ChannelConfig::Sendgrid(c) => {
                        SendgridNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Twilio(c) => {
                        TwilioNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Textbelt(c) => {
                        TextbeltNotifier::new(c, client.clone()).map(boxed)
                    }
                    ChannelConfig::Disabled { .. } => return None,
                };

                Some(match built {
                    Ok(notifier) => Slot::Ready(notifier),
                    Err(e) => {
                        tracing::warn!(
                            channel = %channel.kind(),
                            error = %e,
                            "notification channel misconfigured, will report failure"
                        );
                        Slot::Invalid {
                            kind: channel.kind(),
                            reason: e.to_string(),
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        tracing::info!(
            channels = ?slots.iter().map(Slot::kind).collect::<Vec<_>>(),
            timeout_secs = config.timeout.as_secs(),
            "notification manager configured"
        );

        Ok(Self {
            slots,
            timeout: config.timeout,
        })
    }

    /// Build a manager around ready-made notifiers, in the given order.
    pub fn with_notifiers(notifiers: Vec<Box<dyn Notifier>>, timeout: Duration) -> Self {
        Self {
            slots: notifiers.into_iter().map(Slot::Ready).collect(),
            timeout,
        }
    }

    /// Enabled channels in dispatch order.
    pub fn channels(&self) -> Vec<ChannelKind> {
        self.slots.iter().map(Slot::kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deliver `(title, body)` to every enabled channel.
    ///
    /// Returns one result per channel in configuration order. Never fails
    /// as a whole; every call sends again.
    pub async fn broadcast(&self, title: &str, body: &str) -> Vec<DispatchResult> {
        self.broadcast_event(&AlertEvent::new(title, body)).await
    }

    pub async fn broadcast_event(&self, event: &AlertEvent) -> Vec<DispatchResult> {
        if self.slots.is_empty() {
            tracing::debug!("No notification channels configured");
            return Vec::new();
        }

        // join_all keeps input order regardless of completion order.
        let results = join_all(self.slots.iter().map(|slot| self.attempt(slot, event))).await;

        let delivered = results.iter().filter(|r| r.success).count();
        tracing::info!(
            delivered,
            failed = results.len() - delivered,
            "broadcast finished"
        );
        results
    }

    async fn attempt(&self, slot: &Slot, event: &AlertEvent) -> DispatchResult {
        let channel = slot.kind();
        let start = Instant::now();

        let result = match slot {
            Slot::Ready(notifier) => {
                match tokio::time::timeout(self.timeout, notifier.send(event)).await {
                    Ok(sent) => sent,
                    Err(_) => Err(NotifyError::Timeout(self.timeout)),
                }
            }
            Slot::Invalid { reason, .. } => Err(NotifyError::Config(reason.clone())),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(%channel, duration_ms, "Notification delivered");
                DispatchResult::delivered(channel, duration_ms)
            }
            Err(e) => {
                tracing::warn!(
                    %channel,
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                DispatchResult::failed(channel, &e, duration_ms)
            }
        }
    }
}

/// Aggregate view of one broadcast, for callers deciding how to escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NoChannels,
    AllSucceeded,
    PartialFailure,
    AllFailed,
}

impl Outcome {
    pub fn classify(results: &[DispatchResult]) -> Self {
        let delivered = results.iter().filter(|r| r.success).count();
        match (results.len(), delivered) {
            (0, _) => Outcome::NoChannels,
            (total, d) if d == total => Outcome::AllSucceeded,
            (_, 0) => Outcome::AllFailed,
            _ => Outcome::PartialFailure,
        }
    }
}
