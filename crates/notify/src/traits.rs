//! Notifier trait definition and shared types.

use std::time::Duration;

use pagewatch_core::ChannelKind;
use serde::Serialize;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl NotifyError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            NotifyError::Http(_) | NotifyError::Timeout(_) | NotifyError::Smtp(_) => {
                FailureKind::Transport
            }
            NotifyError::Rejected { .. } | NotifyError::RateLimited { .. } => FailureKind::Rejected,
            NotifyError::Template(_) | NotifyError::Config(_) => FailureKind::Invalid,
        }
    }
}

/// Coarse classification of a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, timeout, DNS or TLS failure.
    Transport,
    /// The remote service answered with a non-success status or body.
    Rejected,
    /// The channel could not be set up from its configuration.
    Invalid,
}

/// One alert to broadcast. Created once per monitoring trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    pub title: String,
    pub body: String,
}

impl AlertEvent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert through this channel. One attempt, no retries.
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError>;

    /// Which transport this notifier speaks.
    fn kind(&self) -> ChannelKind;
}

/// Result of dispatching an alert to a single channel.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub channel: ChannelKind,
    pub success: bool,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub duration_ms: u64,
}

impl DispatchResult {
    pub fn delivered(channel: ChannelKind, duration_ms: u64) -> Self {
        Self {
            channel,
            success: true,
            error: None,
            failure: None,
            duration_ms,
        }
    }

    pub fn failed(channel: ChannelKind, error: &NotifyError, duration_ms: u64) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.to_string()),
            failure: Some(error.failure_kind()),
            duration_ms,
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
