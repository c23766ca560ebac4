//! Notification fan-out for page-change alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Discord, Telegram, Mailgun, Slack, webhook and SMTP notifiers
//! - SendGrid email and Twilio/Textbelt SMS notifiers
//! - Minijinja templates for composing alerts and webhook bodies
//! - `NotificationManager`, which broadcasts one alert to every enabled channel

pub mod discord;
pub mod email;
mod http;
pub mod mailgun;
pub mod manager;
pub mod sendgrid;
pub mod slack;
pub mod sms;
pub mod telegram;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use manager::{NotificationManager, Outcome};
pub use templating::{AlertTemplates, ChangeContext};
pub use traits::{AlertEvent, DispatchResult, FailureKind, Notifier, NotifyError};
