//! Client configuration and constructor-time validation.
//!
//! [`ClientOptions`] collects every tunable of the client runtime. Values are
//! validated once, when a [`SocketClient`](crate::SocketClient) is built, and
//! the resulting [`ClientConfig`] is immutable for the life of the client.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::client::FileValidator;
use crate::request::RequestHooks;

/// Default upstream API root.
pub const DEFAULT_BASE_URL: &str = "https://api.socket.dev/v0/";

/// Default per-request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Smallest accepted client timeout (5 seconds).
pub const MIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest accepted client timeout (5 minutes).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of retries after the initial attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default time-to-live for cached responses (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default ceiling on buffered response bodies (50 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 50 * 1024 * 1024;

/// Maximum API token length after trimming.
pub const MAX_TOKEN_LENGTH: usize = 1024;

/// Errors raised while validating client construction arguments.
///
/// These are never retried and never converted into an [`ApiResult`](crate::ApiResult).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Token was empty or contained only whitespace.
    #[error("API token is required and cannot be empty or whitespace-only")]
    EmptyToken,

    /// Token exceeded [`MAX_TOKEN_LENGTH`] characters.
    #[error("API token is too long: {length} characters exceeds the maximum of {max}")]
    TokenTooLong {
        /// Length of the trimmed token.
        length: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Timeout outside [`MIN_TIMEOUT`]..=[`MAX_TIMEOUT`].
    #[error("timeout of {value_ms}ms is out of range: expected {min_ms}..={max_ms}ms")]
    TimeoutOutOfRange {
        /// Rejected timeout in milliseconds.
        value_ms: u128,
        /// Minimum accepted timeout in milliseconds.
        min_ms: u128,
        /// Maximum accepted timeout in milliseconds.
        max_ms: u128,
    },

    /// Base URL did not parse or used an unsupported scheme.
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A value could not be encoded as an HTTP header.
    #[error("invalid value for the {name} header")]
    InvalidHeader {
        /// Header name.
        name: String,
    },

    /// The HTTP transport could not be constructed.
    #[error("HTTP client construction failed: {source}")]
    ClientBuild {
        /// Underlying builder failure.
        #[source]
        source: reqwest::Error,
    },
}

/// Cache time-to-live settings.
///
/// Resolution order for a call: explicit per-call TTL, then the per-endpoint
/// TTL, then `default`. A disabled cache always resolves to zero.
#[derive(Debug, Clone)]
pub struct CacheTtl {
    /// TTL applied when no endpoint-specific value exists.
    pub default: Duration,
    /// TTL overrides keyed by endpoint name (for example `getQuota`).
    pub per_endpoint: HashMap<String, Duration>,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            default: DEFAULT_CACHE_TTL,
            per_endpoint: HashMap::new(),
        }
    }
}

impl CacheTtl {
    /// Uses a single TTL for every endpoint.
    #[must_use]
    pub fn global(ttl: Duration) -> Self {
        Self {
            default: ttl,
            per_endpoint: HashMap::new(),
        }
    }

    /// Adds an endpoint-specific TTL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>, ttl: Duration) -> Self {
        self.per_endpoint.insert(endpoint.into(), ttl);
        self
    }

    /// Resolves the effective TTL for one call.
    #[must_use]
    pub fn resolve(&self, endpoint: Option<&str>, call_override: Option<Duration>) -> Duration {
        if let Some(ttl) = call_override {
            return ttl;
        }
        endpoint
            .and_then(|name| self.per_endpoint.get(name).copied())
            .unwrap_or(self.default)
    }
}

/// Caller-facing configuration for [`SocketClient`](crate::SocketClient).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use socket_sdk::{CacheTtl, ClientOptions};
///
/// let options = ClientOptions::default()
///     .base_url("https://api.socket.dev/v0")
///     .timeout(Duration::from_secs(60))
///     .retries(5)
///     .cache(true)
///     .cache_ttl(
///         CacheTtl::global(Duration::from_secs(60))
///             .with_endpoint("getQuota", Duration::from_secs(10)),
///     );
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) cache: bool,
    pub(crate) cache_ttl: CacheTtl,
    pub(crate) max_response_size: usize,
    pub(crate) user_agent: Option<String>,
    pub(crate) hooks: Option<Arc<dyn RequestHooks>>,
    pub(crate) file_validator: Option<Arc<dyn FileValidator>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            cache: false,
            cache_ttl: CacheTtl::default(),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            user_agent: None,
            hooks: None,
            file_validator: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("cache", &self.cache)
            .field("cache_ttl", &self.cache_ttl)
            .field("max_response_size", &self.max_response_size)
            .field("user_agent", &self.user_agent)
            .field("hooks", &self.hooks.is_some())
            .field("file_validator", &self.file_validator.is_some())
            .finish()
    }
}

impl ClientOptions {
    /// Sets the API root; a trailing slash is added when missing.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many times a retryable failure is retried.
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the base delay for exponential backoff.
    #[must_use]
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Enables or disables the response cache.
    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Sets cache TTLs.
    #[must_use]
    pub fn cache_ttl(mut self, cache_ttl: CacheTtl) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Sets the ceiling on buffered response bodies in bytes.
    #[must_use]
    pub fn max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Overrides the derived User-Agent header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Installs request/response observation hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn RequestHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Installs the callback consulted when upload candidates are unreadable.
    #[must_use]
    pub fn file_validator(mut self, validator: Arc<dyn FileValidator>) -> Self {
        self.file_validator = Some(validator);
        self
    }

    /// Validates the options together with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a blank or oversized token, an
    /// out-of-range timeout or an unusable base URL.
    pub fn validate(self, token: &str) -> Result<ClientConfig, ValidationError> {
        let token = validate_token(token)?;
        validate_timeout(self.timeout)?;
        let base_url = normalize_base_url(&self.base_url)?;

        Ok(ClientConfig {
            token,
            base_url,
            timeout: self.timeout,
            retries: self.retries,
            retry_delay: self.retry_delay,
            cache: self.cache,
            cache_ttl: self.cache_ttl,
            max_response_size: self.max_response_size,
            user_agent: self.user_agent,
            hooks: self.hooks,
            file_validator: self.file_validator,
        })
    }
}

/// Validated, immutable client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) token: String,
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) cache: bool,
    pub(crate) cache_ttl: CacheTtl,
    pub(crate) max_response_size: usize,
    pub(crate) user_agent: Option<String>,
    pub(crate) hooks: Option<Arc<dyn RequestHooks>>,
    pub(crate) file_validator: Option<Arc<dyn FileValidator>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Normalized API root (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether response caching is enabled.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache
    }

    /// Resolves the cache TTL for a call; zero when caching is off.
    #[must_use]
    pub fn cache_ttl_for(
        &self,
        endpoint: Option<&str>,
        call_override: Option<Duration>,
    ) -> Duration {
        if self.cache {
            self.cache_ttl.resolve(endpoint, call_override)
        } else {
            Duration::ZERO
        }
    }
}

/// Trims and length-checks an API token.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyToken`] or [`ValidationError::TokenTooLong`].
pub fn validate_token(token: &str) -> Result<String, ValidationError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyToken);
    }
    let length = trimmed.chars().count();
    if length > MAX_TOKEN_LENGTH {
        return Err(ValidationError::TokenTooLong {
            length,
            max: MAX_TOKEN_LENGTH,
        });
    }
    Ok(trimmed.to_string())
}

fn validate_timeout(timeout: Duration) -> Result<(), ValidationError> {
    if (MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout) {
        return Ok(());
    }
    Err(ValidationError::TimeoutOutOfRange {
        value_ms: timeout.as_millis(),
        min_ms: MIN_TIMEOUT.as_millis(),
        max_ms: MAX_TIMEOUT.as_millis(),
    })
}

/// Parses `raw` as an `http`/`https` URL and guarantees a trailing slash.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidBaseUrl`] when parsing fails or the
/// scheme is not HTTP(S).
pub fn normalize_base_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash).map_err(|e| ValidationError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{other}`; expected http or https"),
        }),
    }
}
