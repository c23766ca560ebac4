//! Minijinja template rendering for alert messages.
//!
//! Two contexts are exposed to templates: [`ChangeContext`] when composing
//! an [`AlertEvent`] from a detected page change, and [`WebhookContext`]
//! when rendering a custom webhook body.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use chrono::{DateTime, Utc};
use pagewatch_core::config::TemplateSettings;
use serde::Serialize;

use crate::traits::{truncate_chars, AlertEvent, NotifyError};

pub const DEFAULT_SUBJECT_TEMPLATE: &str = "🚨 Website Update Detected";

pub const DEFAULT_BODY_TEMPLATE: &str = "Content change detected on {{ url }}

URL: {{ url }}
Timestamp: {{ detected_at }}

PREVIOUS CONTENT:
{{ previous }}

NEW CONTENT:
{{ current }}

This is an automated alert from your website monitor.";

/// A detected change, as handed over by the page monitor.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeContext {
    pub url: String,
    pub previous: String,
    pub current: String,
    /// Detection time, `YYYY-MM-DD HH:MM:SS UTC`.
    pub detected_at: String,
}

impl ChangeContext {
    pub fn new(url: impl Into<String>, previous: impl Into<String>, current: impl Into<String>) -> Self {
        Self::at(url, previous, current, Utc::now())
    }

    pub fn at(
        url: impl Into<String>,
        previous: impl Into<String>,
        current: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            previous: previous.into(),
            current: current.into(),
            detected_at: detected_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Fields available to webhook body templates; also the default payload.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookContext {
    pub title: String,
    pub message: String,
    /// RFC 3339 send time.
    pub timestamp: String,
    /// Source page URL, empty when not configured.
    pub url: String,
}

/// Renders templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("shorten", shorten_filter);
        env.add_function("env", env_function);
        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render<S: Serialize>(&self, template_str: &str, ctx: &S) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check syntax only; nothing is evaluated.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Subject and body templates used to compose an [`AlertEvent`].
#[derive(Debug)]
pub struct AlertTemplates {
    subject: String,
    body: String,
    renderer: TemplateRenderer,
}

impl AlertTemplates {
    /// Both templates are syntax-checked up front.
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Result<Self, NotifyError> {
        let templates = Self {
            subject: subject.into(),
            body: body.into(),
            renderer: TemplateRenderer::new(),
        };
        templates.renderer.validate(&templates.subject)?;
        templates.renderer.validate(&templates.body)?;
        Ok(templates)
    }

    /// Defaults, with whichever templates the config overrides.
    pub fn from_settings(settings: &TemplateSettings) -> Result<Self, NotifyError> {
        Self::new(
            settings.subject.as_deref().unwrap_or(DEFAULT_SUBJECT_TEMPLATE),
            settings.body.as_deref().unwrap_or(DEFAULT_BODY_TEMPLATE),
        )
    }

    pub fn render(&self, change: &ChangeContext) -> Result<AlertEvent, NotifyError> {
        let title = self.renderer.render(&self.subject, change)?;
        let body = self.renderer.render(&self.body, change)?;
        Ok(AlertEvent::new(title.trim(), body))
    }
}

impl Default for AlertTemplates {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            body: DEFAULT_BODY_TEMPLATE.to_string(),
            renderer: TemplateRenderer::new(),
        }
    }
}

/// Custom filter: cut a string to N characters (default 200).
fn shorten_filter(value: String, max: Option<usize>) -> String {
    truncate_chars(&value, max.unwrap_or(200))
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
