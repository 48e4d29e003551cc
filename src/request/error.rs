//! Error types for a single request/response exchange.
//!
//! [`RequestError`] describes what went wrong with one physical attempt. It
//! is what the retry policy classifies; the client later turns the final
//! error into a user-facing [`SocketError`](crate::SocketError).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::Method;
use crate::multipart::PartReadError;

/// Why a body declared as JSON could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonDiagnostic {
    /// The response carried a non-JSON `Content-Type`.
    UnexpectedContentType(String),
    /// The body starts like an HTML document.
    HtmlBody,
    /// The body contains gateway error text from an intermediary proxy.
    GatewayError,
}

impl fmt::Display for JsonDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedContentType(content_type) => {
                write!(f, "Unexpected Content-Type: {content_type}")
            }
            Self::HtmlBody => f.write_str(
                "Response appears to be HTML, not JSON (possibly an error page or login redirect)",
            ),
            Self::GatewayError => f.write_str(
                "Response contains gateway error text; an intermediary proxy may be failing",
            ),
        }
    }
}

fn render_diagnostics(diagnostics: &[JsonDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| format!("\n→ {diagnostic}"))
        .collect()
}

/// Errors that can occur during one request/response exchange.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network-level error (DNS resolution, connection refused, TLS, reset).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within its timeout.
    #[error("timeout after {timeout_ms}ms requesting {url}")]
    Timeout {
        /// The request URL.
        url: String,
        /// The timeout that expired, in milliseconds.
        timeout_ms: u128,
    },

    /// The response body exceeded the configured size ceiling.
    #[error("response from {url} exceeded the {limit} byte size limit")]
    ResponseTooLarge {
        /// The request URL.
        url: String,
        /// The configured ceiling in bytes.
        limit: usize,
    },

    /// A body expected to be JSON could not be parsed or carried gateway error text.
    #[error("Socket API returned invalid JSON response{}", render_diagnostics(diagnostics))]
    InvalidJson {
        /// The request URL.
        url: String,
        /// Independent explanations of why parsing failed.
        diagnostics: Vec<JsonDiagnostic>,
        /// Bounded preview of the body.
        preview: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The request URL.
        url: String,
        /// The request method.
        method: Method,
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        status_text: String,
        /// Response body text, if any was returned.
        body: Option<String>,
        /// The `Retry-After` header value, if present.
        retry_after: Option<String>,
    },

    /// A file in a multipart body failed while the request was being sent.
    #[error("could not read upload file {} requesting {url}: {detail}", path.display())]
    UploadFile {
        /// The request URL.
        url: String,
        /// The file that failed.
        path: PathBuf,
        /// The IO error text.
        detail: String,
    },

    /// A caller-supplied header name or value was not valid HTTP.
    #[error("invalid request header: {name}")]
    InvalidHeader {
        /// The rejected header name.
        name: String,
    },

    /// The request URL could not be built from the base URL and path.
    #[error("invalid request URL: {url}")]
    InvalidUrl {
        /// The rejected URL or path.
        url: String,
    },
}

impl RequestError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, timeout_ms: u128) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout_ms,
        }
    }

    /// Creates an upload file error from a failed multipart part.
    pub fn upload_file(url: impl Into<String>, part: &PartReadError) -> Self {
        Self::UploadFile {
            url: url.into(),
            path: part.path.clone(),
            detail: part.source.to_string(),
        }
    }

    /// Creates a response-size error.
    pub fn response_too_large(url: impl Into<String>, limit: usize) -> Self {
        Self::ResponseTooLarge {
            url: url.into(),
            limit,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(
        url: impl Into<String>,
        method: Method,
        status: u16,
        status_text: impl Into<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            method,
            status,
            status_text: status_text.into(),
            body: None,
            retry_after: None,
        }
    }

    /// Attaches the response body to an HTTP status error.
    #[must_use]
    pub fn with_body(mut self, text: Option<String>) -> Self {
        if let Self::HttpStatus { body, .. } = &mut self {
            *body = text;
        }
        self
    }

    /// Attaches a `Retry-After` value to an HTTP status error.
    #[must_use]
    pub fn with_retry_after(mut self, value: Option<String>) -> Self {
        if let Self::HttpStatus { retry_after, .. } = &mut self {
            *retry_after = value;
        }
        self
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid header error.
    pub fn invalid_header(name: impl Into<String>) -> Self {
        Self::InvalidHeader { name: name.into() }
    }

    /// HTTP status code, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
