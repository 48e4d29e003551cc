//! Observation hooks and header redaction.
//!
//! Hooks see every physical attempt exactly once on each side: `on_request`
//! before the request is sent and `on_response` once response headers are
//! known (or the attempt failed at the transport level). They are for
//! observability only; their return values cannot alter the exchange.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::HeaderMap;

use super::Method;

/// Replacement value for sensitive headers.
pub const REDACTED: &str = "[REDACTED]";

/// Header names whose values never reach a diagnostic sink.
const SENSITIVE_HEADERS: [&str; 6] = [
    "authorization",
    "cookie",
    "proxy-authenticate",
    "proxy-authorization",
    "set-cookie",
    "www-authenticate",
];

/// Renders headers for diagnostics with sensitive values redacted.
///
/// Repeated headers are joined with `", "`; values that are not valid UTF-8
/// are rendered lossily.
#[must_use]
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut rendered = BTreeMap::new();
    for name in headers.keys() {
        let key = name.as_str().to_ascii_lowercase();
        let value = if SENSITIVE_HEADERS.contains(&key.as_str()) {
            REDACTED.to_string()
        } else {
            headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ")
        };
        rendered.insert(key, value);
    }
    rendered
}

/// What `on_request` sees for each attempt.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Request method.
    pub method: Method,
    /// Fully resolved URL.
    pub url: String,
    /// Request headers, redacted.
    pub headers: BTreeMap<String, String>,
    /// Timeout in effect for this attempt.
    pub timeout: Duration,
    /// Attempt number (0 for the first try).
    pub attempt: u32,
}

/// What `on_response` sees for each attempt.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    /// Request method.
    pub method: Method,
    /// Fully resolved URL.
    pub url: String,
    /// Response status, absent on transport failure.
    pub status: Option<u16>,
    /// Reason phrase for the status.
    pub status_text: Option<String>,
    /// Response headers, redacted.
    pub headers: BTreeMap<String, String>,
    /// Time from send to headers (or failure).
    pub duration: Duration,
    /// Transport error description, when no response arrived.
    pub error: Option<String>,
    /// Attempt number (0 for the first try).
    pub attempt: u32,
}

/// Observer injected into the client at construction.
///
/// Both methods default to no-ops so implementors override only what they need.
pub trait RequestHooks: Send + Sync {
    /// Called once per attempt before the request is sent.
    fn on_request(&self, _info: &RequestInfo) {}

    /// Called once per attempt after response headers arrive or the attempt fails.
    fn on_response(&self, _info: &ResponseInfo) {}
}
