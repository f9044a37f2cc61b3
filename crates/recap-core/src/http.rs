use std::time::Duration;
use ureq::{Agent, Error as UreqError};

use crate::error::TransportError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const TIMEOUT_RESOLVE: Duration = Duration::from_secs(5);
const TIMEOUT_CONNECT: Duration = Duration::from_secs(5);
const TIMEOUT_SEND_REQUEST: Duration = Duration::from_secs(5);
const TIMEOUT_SEND_BODY: Duration = Duration::from_secs(15);

const RETRY_BASE_MS: u64 = 500;
const RETRY_MAX_MS: u64 = 8_000;
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Agent with per-phase timeouts bounded by `timeout` overall.
///
/// Status codes are returned as responses so error bodies can be classified.
pub fn default_agent(timeout: Duration) -> Agent {
    let config = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .timeout_per_call(Some(timeout))
        .timeout_resolve(Some(TIMEOUT_RESOLVE.min(timeout)))
        .timeout_connect(Some(TIMEOUT_CONNECT.min(timeout)))
        .timeout_send_request(Some(TIMEOUT_SEND_REQUEST.min(timeout)))
        .timeout_send_body(Some(TIMEOUT_SEND_BODY.min(timeout)))
        .timeout_recv_response(Some(timeout))
        .timeout_recv_body(Some(timeout))
        .build();
    config.into()
}

/// Classify a non-success HTTP status.
pub fn classify_status(status: u16, message: String) -> TransportError {
    match status {
        401 | 403 => TransportError::Unauthorized(format!("HTTP {status}: {message}")),
        404 => TransportError::NotFound(format!("HTTP {status}: {message}")),
        429 => TransportError::RateLimited(format!("HTTP {status}: {message}")),
        400 | 413 | 422 => TransportError::Validation(format!("HTTP {status}: {message}")),
        408 => TransportError::Network(format!("HTTP {status}: {message}")),
        _ => TransportError::Unknown(format!("HTTP {status}: {message}")),
    }
}

/// Classify a failure raised by the HTTP client before a status was received.
pub fn classify_error(err: &UreqError) -> TransportError {
    match err {
        UreqError::StatusCode(code) => classify_status(*code, String::new()),
        UreqError::Timeout(_)
        | UreqError::Io(_)
        | UreqError::HostNotFound
        | UreqError::ConnectionFailed
        | UreqError::TooManyRedirects
        | UreqError::RedirectFailed => TransportError::Network(err.to_string()),
        _ => TransportError::Unknown(err.to_string()),
    }
}

/// Human-readable message out of an error body. Provider errors carry a
/// `message` field; anything else is truncated.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "Message", "error"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based). Never decreases with `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let delay = self.base_delay.saturating_mul(1_u32 << shift);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(RETRY_BASE_MS),
            max_delay: Duration::from_millis(RETRY_MAX_MS),
        }
    }
}
