//! Mastodon platform implementation
//!
//! Posts a status through the megalodon client, which speaks the Mastodon API
//! also offered by Pleroma, Akkoma and GoToSocial instances. A client is
//! created per publish from the account's instance URL and access token, so
//! one adapter serves any number of accounts.

use std::time::Duration;

use async_trait::async_trait;
use megalodon::megalodon::PostStatusOutput;
use megalodon::SNS;
use tracing::debug;

use crate::credentials::MastodonAccess;
use crate::error::PlatformError;
use crate::platforms::{PublishOutcome, Publisher};
use crate::types::PlatformKind;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Mastodon publisher
pub struct MastodonClient {
    timeout: Duration,
}

impl MastodonClient {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the timeout reported to the dispatcher
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for MastodonClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MastodonClient {
    type Credential = MastodonAccess;

    fn kind(&self) -> PlatformKind {
        PlatformKind::Mastodon
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn publish(&self, credential: &MastodonAccess, text: &str) -> PublishOutcome {
        let instance_url = credential.instance_url();
        debug!("Posting status to {}", instance_url);

        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(credential.access_token().to_string()),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!(
                "Failed to create Mastodon client for {}: {}",
                instance_url, e
            ))
        })?;

        let response = client
            .post_status(text.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(&e, "post status"))?;

        let status_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(status_id)
    }
}

/// Map a megalodon error to a `PlatformError`
///
/// HTTP failures carry their status code and are classified by it; only
/// errors without a status fall back to the message text.
fn map_megalodon_error(error: &megalodon::error::Error, context: &str) -> PlatformError {
    use megalodon::error::{Error, OwnError};

    match error {
        Error::OwnError(OwnError {
            status: Some(code),
            message,
            ..
        }) => classify_status(*code, message, context),
        Error::RequestError(e) if e.is_timeout() => PlatformError::Timeout(format!(
            "Mastodon request timed out ({}): {}",
            context, e
        )),
        Error::RequestError(e) if e.is_decode() => PlatformError::Posting(format!(
            "Unexpected response from Mastodon ({}): {}",
            context, e
        )),
        Error::JsonError(e) => PlatformError::Posting(format!(
            "Unexpected response from Mastodon ({}): {}",
            context, e
        )),
        other => classify_error(&other.to_string(), context),
    }
}

/// Map an HTTP status returned by the instance
///
/// - 401/403 → `Authentication`
/// - 429 → `RateLimit`
/// - 422 and other 4xx → `Validation`
/// - 5xx and anything else → `Network`
fn classify_status(code: u16, body: &str, context: &str) -> PlatformError {
    match code {
        401 | 403 => PlatformError::Authentication(format!(
            "Mastodon rejected the access token ({}): HTTP {} {}",
            context, code, body
        )),
        429 => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): HTTP {} {}",
            context, code, body
        )),
        400..=499 => PlatformError::Validation(format!(
            "Mastodon rejected the status ({}): HTTP {} {}",
            context, code, body
        )),
        500..=599 => PlatformError::Network(format!(
            "Mastodon server error ({}): HTTP {} {}",
            context, code, body
        )),
        _ => PlatformError::Network(format!(
            "Mastodon HTTP error ({}): HTTP {} {}",
            context, code, body
        )),
    }
}

/// Map an error message without a structured status to a `PlatformError`
///
/// A status found in the text is classified as in [`classify_status`];
/// otherwise timeouts → `Timeout`, parse failures → `Posting`, anything
/// else → `Network`.
fn classify_error(error_str: &str, context: &str) -> PlatformError {
    if let Some(code) = extract_http_status(error_str) {
        return classify_status(code, error_str, context);
    }

    let error_lower = error_str.to_lowercase();
    if error_lower.contains("timed out") || error_lower.contains("timeout") {
        PlatformError::Timeout(format!(
            "Mastodon request timed out ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("unauthorized")
        || error_lower.contains("forbidden")
        || error_lower.contains("access token")
    {
        PlatformError::Authentication(format!(
            "Mastodon rejected the access token ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("rate limit") || error_lower.contains("too many requests") {
        PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("unprocessable") || error_lower.contains("validation") {
        PlatformError::Validation(format!(
            "Mastodon rejected the status ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("parse")
        || error_lower.contains("json")
        || error_lower.contains("deserialize")
    {
        PlatformError::Posting(format!(
            "Unexpected response from Mastodon ({}): {}",
            context, error_str
        ))
    } else {
        PlatformError::Network(format!("Mastodon error ({}): {}", context, error_str))
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for `HTTP 401`, `status 403`, `code: 422` and bare codes such as
/// `500:` or a trailing ` 401` that are not part of a longer number.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    let bytes = error_str.as_bytes();
    for i in 0..bytes.len().saturating_sub(2) {
        let digits = &bytes[i..i + 3];
        let starts_clean = i == 0 || !bytes[i - 1].is_ascii_digit();
        let ends_clean = matches!(bytes.get(i + 3), None | Some(b':') | Some(b' '));
        if !(digits.iter().all(u8::is_ascii_digit) && starts_clean && ends_clean) {
            continue;
        }
        if let Some(code) = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            if (100..=599).contains(&code) {
                return Some(code);
            }
        }
    }

    None
}
