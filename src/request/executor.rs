//! One physical HTTP exchange per call.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::StreamExt;
use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER,
};
use reqwest::{Body, Client, Response};
use serde_json::Value;
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::{JsonDiagnostic, RequestError};
use super::hooks::{RequestHooks, RequestInfo, ResponseInfo, sanitize_headers};
use super::{RequestBody, RequestDescriptor, ResponseType};
use crate::config::{ClientConfig, ValidationError};
use crate::multipart;
use crate::result::Payload;
use crate::user_agent;

/// Upper bound on connection establishment, independent of the request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters of body text kept in invalid-JSON previews.
const PREVIEW_CHARS: usize = 200;

/// `Authorization` header value: `Basic base64(token + ":")`.
///
/// ```
/// use socket_sdk::request::basic_auth_header;
///
/// assert_eq!(basic_auth_header("secret"), "Basic c2VjcmV0Og==");
/// ```
#[must_use]
pub fn basic_auth_header(token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{token}:")))
}

/// Truncates body text for diagnostics.
#[must_use]
pub fn preview_body(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn diagnose_json_failure(content_type: Option<&str>, text: &str) -> Vec<JsonDiagnostic> {
    let mut diagnostics = Vec::new();
    if let Some(content_type) = content_type {
        if !content_type.to_ascii_lowercase().contains("json") {
            diagnostics.push(JsonDiagnostic::UnexpectedContentType(
                content_type.to_string(),
            ));
        }
    }
    let head = text.trim_start().get(..16).unwrap_or(text.trim_start()).to_ascii_lowercase();
    if head.starts_with("<!doctype") || head.starts_with("<html") {
        diagnostics.push(JsonDiagnostic::HtmlBody);
    }
    if contains_gateway_text(text) {
        diagnostics.push(JsonDiagnostic::GatewayError);
    }
    diagnostics
}

/// Proxy error pages can arrive with a 2xx status, sometimes wrapped in JSON.
fn contains_gateway_text(text: &str) -> bool {
    text.contains("502 Bad Gateway") || text.contains("503 Service")
}

fn invalid_json(url: &str, content_type: Option<&str>, text: &str) -> RequestError {
    RequestError::InvalidJson {
        url: url.to_string(),
        diagnostics: diagnose_json_failure(content_type, text),
        preview: preview_body(text),
    }
}

/// Parses a JSON body; an empty or whitespace-only body reads as `{}`.
///
/// Gateway error text is rejected before parsing, so it is caught even when
/// the body is valid JSON.
///
/// # Errors
///
/// Returns [`RequestError::InvalidJson`] with one diagnostic per detected
/// cause (wrong content type, HTML page, gateway error text).
pub fn parse_json_body(
    url: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Value, RequestError> {
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    if contains_gateway_text(&text) {
        debug!(url, "response body contains gateway error text");
        return Err(invalid_json(url, content_type, &text));
    }
    serde_json::from_str(&text).map_err(|e| {
        debug!(url, error = %e, "response body is not valid JSON");
        invalid_json(url, content_type, &text)
    })
}

fn parse_json_lines(
    url: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Vec<Value>, RequestError> {
    let text = String::from_utf8_lossy(body);
    if contains_gateway_text(&text) {
        debug!(url, "response body contains gateway error text");
        return Err(invalid_json(url, content_type, &text));
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(|_| invalid_json(url, content_type, &text)))
        .collect()
}

/// Finds a multipart file failure in a send error's source chain.
fn part_read_error(error: &reqwest::Error) -> Option<&multipart::PartReadError> {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(part) = cause.downcast_ref::<multipart::PartReadError>() {
            return Some(part);
        }
        source = cause.source();
    }
    None
}

/// A fully read 2xx response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body bytes, bounded by the configured size limit.
    pub body: Vec<u8>,
    /// The URL that was requested.
    pub url: String,
}

impl RawResponse {
    /// The response `Content-Type`, if present and readable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Interprets the body according to `response_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidJson`] when a JSON or NDJSON body does
    /// not parse.
    pub fn decode(&self, response_type: ResponseType) -> Result<Payload, RequestError> {
        match response_type {
            ResponseType::Json => {
                parse_json_body(&self.url, self.content_type(), &self.body).map(Payload::Json)
            }
            ResponseType::Text => Ok(Payload::Text(
                String::from_utf8_lossy(&self.body).into_owned(),
            )),
            ResponseType::Stream => {
                parse_json_lines(&self.url, self.content_type(), &self.body).map(Payload::JsonLines)
            }
        }
    }
}

/// Sends requests against the configured API root.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: Url,
    authorization: HeaderValue,
    timeout: Duration,
    max_response_size: usize,
    hooks: Option<Arc<dyn RequestHooks>>,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("max_response_size", &self.max_response_size)
            .field("hooks", &self.hooks.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Builds the HTTP transport from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ClientBuild`] if reqwest rejects the
    /// configuration (for example an unusable User-Agent).
    pub fn new(config: &ClientConfig) -> Result<Self, ValidationError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(user_agent::default_user_agent);

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .map_err(|source| ValidationError::ClientBuild { source })?;

        let mut authorization = HeaderValue::from_str(&basic_auth_header(&config.token))
            .map_err(|_| ValidationError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
            })?;
        authorization.set_sensitive(true);

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            authorization,
            timeout: config.timeout,
            max_response_size: config.max_response_size,
            hooks: config.hooks.clone(),
        })
    }

    /// Resolves a descriptor's path and query against the API root.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidUrl`] when the path cannot be joined.
    pub fn resolve_url(&self, request: &RequestDescriptor) -> Result<Url, RequestError> {
        let path = request.path().trim_start_matches('/');
        let mut url = self
            .base_url
            .join(path)
            .map_err(|_| RequestError::invalid_url(request.path()))?;
        if !request.query().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query());
        }
        Ok(url)
    }

    fn build_headers(&self, request: &RequestDescriptor) -> Result<HeaderMap, RequestError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        match request.body() {
            RequestBody::Empty => {}
            RequestBody::Json(_) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            RequestBody::Multipart(_) => {
                let value = HeaderValue::from_str(&multipart::content_type())
                    .map_err(|_| RequestError::invalid_header(CONTENT_TYPE.as_str()))?;
                headers.insert(CONTENT_TYPE, value);
            }
        }
        for (name, value) in request.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RequestError::invalid_header(name))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| RequestError::invalid_header(name))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    /// Performs one attempt of `request`.
    ///
    /// Hooks fire exactly once on each side of the exchange. A non-2xx status
    /// becomes [`RequestError::HttpStatus`] carrying the body text and any
    /// `Retry-After` value; the body is never read past the size limit.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] describing why the attempt failed.
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(method = %request.method(), path = %request.path(), attempt)
    )]
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        attempt: u32,
    ) -> Result<RawResponse, RequestError> {
        let url = self.resolve_url(request)?;
        let url_text = url.to_string();
        let timeout = request.timeout().unwrap_or(self.timeout);
        let timeout_ms = timeout.as_millis();
        let headers = self.build_headers(request)?;

        if let Some(hooks) = &self.hooks {
            hooks.on_request(&RequestInfo {
                method: request.method(),
                url: url_text.clone(),
                headers: sanitize_headers(&headers),
                timeout,
                attempt,
            });
        }

        let mut builder = self
            .client
            .request(request.method().to_reqwest(), url)
            .headers(headers)
            .timeout(timeout);
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Multipart(parts) => {
                builder.body(Body::wrap_stream(multipart::body_stream(parts.clone())))
            }
        };

        let started = Instant::now();
        let sent = builder.send().await;
        let duration = started.elapsed();

        let response = match sent {
            Ok(response) => {
                self.notify_response(request, &url_text, attempt, duration, Ok(&response));
                response
            }
            Err(e) => {
                self.notify_response(request, &url_text, attempt, duration, Err(&e));
                if let Some(part) = part_read_error(&e) {
                    debug!(path = %part.path.display(), "upload file failed mid-request");
                    return Err(RequestError::upload_file(url_text, part));
                }
                return Err(if e.is_timeout() {
                    RequestError::timeout(url_text, timeout_ms)
                } else {
                    RequestError::network(url_text, e)
                });
            }
        };

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let response_headers = response.headers().clone();
        trace!(status = status.as_u16(), elapsed_ms = duration.as_millis(), "response headers received");

        if !status.is_success() {
            let retry_after = response_headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            let body = self
                .read_body(response, &url_text, timeout_ms)
                .await
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
                .filter(|text| !text.is_empty());
            debug!(status = status.as_u16(), "request failed with HTTP status");
            return Err(RequestError::http_status(
                url_text,
                request.method(),
                status.as_u16(),
                status_text,
            )
            .with_body(body)
            .with_retry_after(retry_after));
        }

        let body = self.read_body(response, &url_text, timeout_ms).await?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text,
            headers: response_headers,
            body,
            url: url_text,
        })
    }

    fn notify_response(
        &self,
        request: &RequestDescriptor,
        url: &str,
        attempt: u32,
        duration: Duration,
        outcome: Result<&Response, &reqwest::Error>,
    ) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let info = match outcome {
            Ok(response) => ResponseInfo {
                method: request.method(),
                url: url.to_string(),
                status: Some(response.status().as_u16()),
                status_text: response.status().canonical_reason().map(str::to_string),
                headers: sanitize_headers(response.headers()),
                duration,
                error: None,
                attempt,
            },
            Err(error) => ResponseInfo {
                method: request.method(),
                url: url.to_string(),
                status: None,
                status_text: None,
                headers: std::collections::BTreeMap::new(),
                duration,
                error: Some(error.to_string()),
                attempt,
            },
        };
        hooks.on_response(&info);
    }

    /// Reads the body incrementally, failing as soon as it exceeds the limit.
    async fn read_body(
        &self,
        response: Response,
        url: &str,
        timeout_ms: u128,
    ) -> Result<Vec<u8>, RequestError> {
        let limit = self.max_response_size;
        if let Some(length) = response.content_length() {
            if usize::try_from(length).map_or(true, |length| length > limit) {
                debug!(length, limit, "declared content length exceeds limit");
                return Err(RequestError::response_too_large(url, limit));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    RequestError::timeout(url, timeout_ms)
                } else {
                    RequestError::network(url, e)
                }
            })?;
            if body.len() + chunk.len() > limit {
                debug!(limit, "response body exceeded limit while streaming");
                return Err(RequestError::response_too_large(url, limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
