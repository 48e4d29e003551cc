//! User-facing errors with actionable guidance.
//!
//! A [`SocketError`] pairs a primary message with an optional `cause` made of
//! `→`-prefixed guidance lines. Every constructor routes the cause through
//! [`filter_redundant_cause`], so a cause never merely repeats its message.

use serde_json::Value;
use thiserror::Error;

use crate::queue::QueueError;
use crate::request::{RequestError, preview_body};
use crate::retry::parse_retry_after;
use crate::summarize::{DEFAULT_SIMILARITY_THRESHOLD, filter_redundant_cause};

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// DNS, connection, TLS or timeout failure.
    Transport,
    /// The response could not be used (bad JSON, HTML page, oversized body).
    Protocol,
    /// The API answered with a non-2xx status.
    HttpStatus,
    /// The request could not be built from the caller's input.
    InvalidRequest,
    /// A batch task was evicted from the concurrency queue backlog.
    QueueDropped,
    /// Upload files failed validation.
    FileValidation,
}

/// Classified failure of one logical API call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SocketError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    cause: Option<String>,
}

impl SocketError {
    /// Creates an error, dropping `cause` when it restates `message`.
    pub fn new(
        kind: ErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        let message = message.into();
        let cause = filter_redundant_cause(&message, cause.as_deref(), DEFAULT_SIMILARITY_THRESHOLD)
            .map(str::to_string);
        Self {
            kind,
            status,
            message,
            cause,
        }
    }

    /// Failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Primary message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Guidance text, if any survived redundancy filtering.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// Message followed by the cause on the next line.
    #[must_use]
    pub fn report(&self) -> String {
        match &self.cause {
            Some(cause) => format!("{}\n{cause}", self.message),
            None => self.message.clone(),
        }
    }

    /// Classifies the final error of a logical call.
    #[must_use]
    pub fn from_request_error(error: &RequestError) -> Self {
        match error {
            RequestError::HttpStatus {
                status,
                status_text,
                body,
                retry_after,
                ..
            } => {
                let status_text = if status_text.is_empty() {
                    "Unknown Status"
                } else {
                    status_text.as_str()
                };
                let mut message = format!("Socket API Request failed ({status}): {status_text}");
                if let Some(detail) = body.as_deref().and_then(upstream_detail) {
                    if let Some(detail) =
                        filter_redundant_cause(&message, Some(&detail), DEFAULT_SIMILARITY_THRESHOLD)
                    {
                        message = format!("{message}: {detail}");
                    }
                }
                Self::new(
                    ErrorKind::HttpStatus,
                    Some(*status),
                    message,
                    status_guidance(*status, retry_after.as_deref()),
                )
            }
            RequestError::Timeout { timeout_ms, .. } => Self::new(
                ErrorKind::Transport,
                None,
                format!("Socket API request timed out after {timeout_ms}ms"),
                Some(
                    "→ The server did not respond within the timeout.\n\
                     → Try: increase the timeout option or retry when the network is stable."
                        .to_string(),
                ),
            ),
            RequestError::Network { source, .. } => Self::new(
                ErrorKind::Transport,
                None,
                format!("Socket API request failed: {}", root_cause(source)),
                Some(
                    "→ Could not reach the Socket API.\n\
                     → Check: network connectivity, proxy settings and the configured base URL."
                        .to_string(),
                ),
            ),
            RequestError::ResponseTooLarge { limit, .. } => Self::new(
                ErrorKind::Protocol,
                None,
                format!("Socket API response exceeded the maximum size of {limit} bytes"),
                Some(
                    "→ Request less data per call (fewer packages or a smaller page size), \
                     or raise the maximum response size."
                        .to_string(),
                ),
            ),
            RequestError::InvalidJson { preview, .. } => Self::new(
                ErrorKind::Protocol,
                None,
                error.to_string(),
                (!preview.is_empty()).then(|| format!("→ Response preview: {preview}")),
            ),
            RequestError::UploadFile { path, detail, .. } => Self::new(
                ErrorKind::FileValidation,
                None,
                format!("Could not read upload file {}: {detail}", path.display()),
                Some(
                    "→ The file became unreadable after the upload started.\n\
                     → Check: the file still exists and is not being replaced, then retry."
                        .to_string(),
                ),
            ),
            RequestError::InvalidHeader { .. } | RequestError::InvalidUrl { .. } => {
                Self::new(ErrorKind::InvalidRequest, None, error.to_string(), None)
            }
        }
    }

    /// A batch task evicted from the queue backlog.
    #[must_use]
    pub fn from_queue_error(error: &QueueError) -> Self {
        let cause = match error {
            QueueError::Dropped { .. } => Some(
                "→ The batch backlog was full. Lower the number of queued requests \
                 or raise the backlog limit."
                    .to_string(),
            ),
            QueueError::Panicked { .. } | QueueError::InvalidConcurrency { .. } => None,
        };
        Self::new(ErrorKind::QueueDropped, None, error.to_string(), cause)
    }

    /// A failed upload file validation.
    pub fn file_validation(message: impl Into<String>, cause: Option<String>) -> Self {
        Self::new(ErrorKind::FileValidation, None, message, cause)
    }

    /// A response body that parsed as JSON but not into the expected shape.
    #[must_use]
    pub fn unexpected_shape(status: u16, error: &serde_json::Error) -> Self {
        Self::new(
            ErrorKind::Protocol,
            Some(status),
            format!("Socket API returned an unexpected response shape: {error}"),
            None,
        )
    }
}

/// Guidance for an HTTP status.
fn status_guidance(status: u16, retry_after: Option<&str>) -> Option<String> {
    let text = match status {
        400 => "→ Bad request. The API rejected the request parameters.\n\
                → Check: all required parameters are present and correctly formatted."
            .to_string(),
        401 => "→ Authentication failed. The API token was rejected.\n\
                → Verify the token is correct and has not been revoked."
            .to_string(),
        403 => "→ Authorization failed. The API token lacks permission for this resource.\n\
                → Check the token's scopes and your organization's plan."
            .to_string(),
        404 => "→ Resource not found. Check the organization slug, repository \
                or identifier in the request."
            .to_string(),
        413 => "→ Payload too large. The upload exceeds the server limit.\n\
                → Try: reduce the number of files or their total size."
            .to_string(),
        429 => {
            let wait = match retry_after.and_then(parse_retry_after) {
                Some(delay) => format!("→ Retry after {} seconds.", delay.as_secs()),
                None => "→ Wait before retrying or reduce the request rate.".to_string(),
            };
            format!("→ Rate limit exceeded. Too many requests in a short period.\n{wait}")
        }
        500..=599 => "→ Server error. The Socket API could not handle the request.\n\
                      → Retry later; the failure is on the server side."
            .to_string(),
        _ => return None,
    };
    Some(text)
}

/// Extracts the upstream error text from a failed response body.
///
/// JSON bodies contribute `error.message` plus `error.details`; other bodies
/// contribute their (bounded) text.
fn upstream_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return Some(preview_body(body));
    };
    let error = json.get("error")?;
    let message = match error {
        Value::String(text) => text.clone(),
        other => other.get("message")?.as_str()?.to_string(),
    };
    let details = match error.get("details") {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(details @ Value::Object(_)) => Some(details.to_string()),
        _ => None,
    };
    Some(match details {
        Some(details) => format!("{message} - Details: {details}"),
        None => message,
    })
}

fn root_cause(error: &reqwest::Error) -> String {
    let mut current: &dyn std::error::Error = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
