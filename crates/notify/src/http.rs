//! Response handling shared by the HTTP-based notifiers.

use pagewatch_core::ChannelKind;

use crate::traits::{truncate_chars, NotifyError};

/// Longest slice of a remote error body kept in a failure message.
const MAX_ERROR_BODY: usize = 500;

/// Turn a non-2xx response into [`NotifyError::Rejected`].
pub(crate) async fn ensure_success(
    channel: ChannelKind,
    response: reqwest::Response,
) -> Result<reqwest::StatusCode, NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(status);
    }

    let body_text = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    tracing::warn!(
        %channel,
        %status,
        body = %body_text,
        "remote returned non-2xx status"
    );
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        detail: error_detail(&body_text),
    })
}

pub(crate) fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "<empty body>".to_string()
    } else {
        truncate_chars(trimmed, MAX_ERROR_BODY)
    }
}

/// Parse a URL from config, naming the field in the error.
pub(crate) fn parse_url(field: &str, raw: &str) -> Result<reqwest::Url, NotifyError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| NotifyError::Config(format!("invalid {field} '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NotifyError::Config(format!(
            "invalid {field} '{raw}': unsupported scheme {other}"
        ))),
    }
}
