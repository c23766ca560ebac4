//! Generic HTTP webhook notifier.
//!
//! Delivers alerts as JSON payloads to a configured URL with optional
//! custom headers and a request body template.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use pagewatch_core::{ChannelKind, WebhookChannel};

use crate::http::{ensure_success, parse_url};
use crate::templating::{TemplateRenderer, WebhookContext};
use crate::traits::{AlertEvent, Notifier, NotifyError};

/// Delivers alerts as JSON over HTTP POST to a configured endpoint.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time. Without a body template the
/// payload is `{title, message, timestamp, url}`.
#[derive(Debug)]
pub struct WebhookNotifier {
    /// Target URL (env vars already resolved).
    url: reqwest::Url,
    /// Custom headers to include on every request.
    headers: BTreeMap<String, String>,
    /// Page the alert is about, echoed as `url` in the payload.
    source_url: Option<String>,
    /// Optional minijinja body template, sent as-is after rendering.
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Missing env vars and invalid body templates produce a
    /// [`NotifyError::Config`] error.
    pub fn new(
        channel: &WebhookChannel,
        renderer: Arc<TemplateRenderer>,
        client: reqwest::Client,
    ) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(&channel.url)?;

        let mut resolved_headers = BTreeMap::new();
        for (key, value) in &channel.headers {
            reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| NotifyError::Config(format!("invalid header name: {key}")))?;
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        // Validate body template syntax at construction time.
        if let Some(ref tmpl) = channel.body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        Ok(Self {
            url: parse_url("webhook url", &resolved_url)?,
            headers: resolved_headers,
            source_url: channel.source_url.clone(),
            body_template: channel.body_template.clone(),
            renderer,
            client,
        })
    }

    fn context(&self, event: &AlertEvent) -> WebhookContext {
        WebhookContext {
            title: event.title.clone(),
            message: event.body.clone(),
            timestamp: Utc::now().to_rfc3339(),
            url: self.source_url.clone().unwrap_or_default(),
        }
    }

    /// Request body: the rendered template, or the context as JSON.
    pub fn body(&self, event: &AlertEvent) -> Result<String, NotifyError> {
        let ctx = self.context(event);
        match self.body_template {
            Some(ref tmpl) => self.renderer.render(tmpl, &ctx),
            None => serde_json::to_string(&ctx).map_err(|e| {
                NotifyError::Config(format!("failed to serialize webhook payload: {e}"))
            }),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let body = self.body(event)?;

        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = ensure_success(ChannelKind::Webhook, response).await?;

        tracing::debug!(
            url = %self.url,
            status = %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name).map_err(|_| {
                NotifyError::Config(format!("env var not found: {var_name}"))
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
