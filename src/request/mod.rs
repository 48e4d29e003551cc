//! Request descriptions and the HTTP executor.
//!
//! A [`RequestDescriptor`] is an immutable description of one logical API
//! call: method, path relative to the API root, query parameters, body,
//! extra headers and per-call overrides. The [`RequestExecutor`] turns a
//! descriptor into exactly one physical HTTP exchange; retries, caching and
//! error shaping are layered on top by the client.

mod error;
mod executor;
mod hooks;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::multipart::MultipartPart;

pub use error::{JsonDiagnostic, RequestError};
pub use executor::{
    RawResponse, RequestExecutor, basic_auth_header, parse_json_body, preview_body,
};
pub use hooks::{REDACTED, RequestHooks, RequestInfo, ResponseInfo, sanitize_headers};

/// HTTP methods supported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Only idempotent reads are eligible for the response cache.
    #[must_use]
    pub fn is_cacheable(self) -> bool {
        matches!(self, Self::Get)
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a successful response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// A single JSON document; an empty body is read as `{}`.
    #[default]
    Json,
    /// Raw UTF-8 text.
    Text,
    /// Newline-delimited JSON, one document per non-empty line.
    Stream,
}

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document sent as `application/json`.
    Json(Value),
    /// Streamed `multipart/form-data` parts.
    Multipart(Vec<MultipartPart>),
}

/// Known camelCase query keys and their wire names.
const QUERY_KEY_RENAMES: &[(&str, &str)] = &[
    ("defaultBranch", "default_branch"),
    ("integrationOrgSlug", "integration_org_slug"),
    ("integrationType", "integration_type"),
    ("makeDefaultBranch", "make_default_branch"),
    ("pullRequest", "pull_request"),
    ("setAsPendingHead", "set_as_pending_head"),
];

/// Maps a caller-facing query key to the name the API expects.
#[must_use]
pub fn wire_query_key(key: &str) -> &str {
    QUERY_KEY_RENAMES
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(key, |(_, to)| *to)
}

/// Shapes caller query parameters: renames known keys and drops empty values.
///
/// ```
/// use socket_sdk::request::shape_query;
///
/// let query = shape_query([("defaultBranch", "true"), ("repo", "web"), ("branch", "")]);
/// assert_eq!(query.get("default_branch").map(String::as_str), Some("true"));
/// assert_eq!(query.get("repo").map(String::as_str), Some("web"));
/// assert!(!query.contains_key("branch"));
/// ```
#[must_use]
pub fn shape_query<I, K, V>(params: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    params
        .into_iter()
        .filter_map(|(key, value)| {
            let value = value.into();
            (!value.is_empty()).then(|| (wire_query_key(key.as_ref()).to_string(), value))
        })
        .collect()
}

/// Immutable description of one API call.
///
/// Built with the associated constructors and consuming `with_*` methods.
///
/// ```
/// use std::time::Duration;
/// use socket_sdk::request::{RequestDescriptor, ResponseType};
///
/// let request = RequestDescriptor::get("orgs/acme/full-scans")
///     .with_query([("repo", "web"), ("defaultBranch", "true")])
///     .with_timeout(Duration::from_secs(10))
///     .with_endpoint("getOrgFullScanList");
/// assert_eq!(request.path(), "orgs/acme/full-scans");
/// assert_eq!(request.response_type(), ResponseType::Json);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    body: RequestBody,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    response_type: ResponseType,
    endpoint: Option<String>,
    cache_ttl: Option<Duration>,
}

impl RequestDescriptor {
    /// Creates a descriptor for `method` on `path` (relative to the API root).
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: RequestBody::Empty,
            headers: BTreeMap::new(),
            timeout: None,
            response_type: ResponseType::Json,
            endpoint: None,
            cache_ttl: None,
        }
    }

    /// `GET` descriptor.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// `POST` descriptor.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// `PUT` descriptor.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// `DELETE` descriptor.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// `PATCH` descriptor.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Adds query parameters after [`shape_query`] renaming.
    #[must_use]
    pub fn with_query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.query.extend(shape_query(params));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Sets a multipart body.
    #[must_use]
    pub fn with_multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Adds an extra request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Overrides the client timeout for this call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how the response body is interpreted.
    #[must_use]
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Names the endpoint, used for per-endpoint cache TTLs.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the cache TTL for this call.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Path relative to the API root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Shaped query parameters, sorted by key.
    #[must_use]
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Extra headers.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Per-call timeout override.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Response interpretation.
    #[must_use]
    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    /// Endpoint name, if set.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Per-call cache TTL override.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }
}
