//! The API client: retries, caching and error shaping around the executor.
//!
//! [`SocketClient::send`] is the single path every endpoint goes through:
//!
//! ```text
//! cache lookup ─► retry loop ─► executor attempt ─► decode
//!      ▲                                              │
//!      └──────────── store on success ◄───────────────┘
//! ```
//!
//! Failures are classified once, after the retry loop gives up, so the
//! message and cause are the same whether the caller inspects an
//! [`ApiResult`] or converts it with [`ApiResult::into_result`].

mod batch;
mod endpoints;
mod files;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::cache::{ResponseCache, cache_key};
use crate::config::{ClientConfig, ClientOptions, ValidationError};
use crate::error::SocketError;
use crate::request::{RequestDescriptor, RequestExecutor};
use crate::result::{ApiResult, Payload};
use crate::retry::RetryPolicy;

pub use batch::{
    BatchStreamOptions, DEFAULT_BATCH_CHUNK_SIZE, DEFAULT_BATCH_CONCURRENCY, completion_stream,
};
pub use files::{
    FileValidationDecision, FileValidationReport, FileValidator, partition_readable,
};

/// A successful response as stored in the cache.
#[derive(Debug, Clone)]
struct CachedResponse {
    status: u16,
    payload: Payload,
}

struct Inner {
    config: ClientConfig,
    executor: RequestExecutor,
    retry_policy: RetryPolicy,
    cache: ResponseCache<CachedResponse>,
}

/// Client for the Socket API.
///
/// Cheap to clone; clones share configuration, connection pool and cache.
///
/// ```no_run
/// use socket_sdk::SocketClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SocketClient::new("sktsec_token")?;
/// let quota = client.get_quota().await.into_result()?;
/// println!("{} units left", quota.quota);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SocketClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SocketClient {
    /// Creates a client with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty, whitespace-only or oversized token.
    pub fn new(token: &str) -> Result<Self, ValidationError> {
        Self::with_options(token, ClientOptions::default())
    }

    /// Creates a client with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the token or options are invalid, or
    /// the HTTP transport cannot be built.
    pub fn with_options(token: &str, options: ClientOptions) -> Result<Self, ValidationError> {
        let config = options.validate(token)?;
        let executor = RequestExecutor::new(&config)?;
        let retry_policy = RetryPolicy::from_config(&config);
        debug!(?config, "created Socket API client");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                executor,
                retry_policy,
                cache: ResponseCache::new(),
            }),
        })
    }

    /// Validated configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Sends `request` and returns the decoded payload.
    ///
    /// GET requests go through the response cache when a non-zero TTL
    /// resolves for them; other methods always reach the network.
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn send(&self, request: RequestDescriptor) -> ApiResult<Payload> {
        let ttl = if request.method().is_cacheable() {
            self.inner
                .config
                .cache_ttl_for(request.endpoint(), request.cache_ttl())
        } else {
            Duration::ZERO
        };
        let key = cache_key(request.method(), request.path(), request.query());

        match self
            .inner
            .cache
            .get_or_fetch(&key, ttl, || self.fetch(&request))
            .await
        {
            Ok(response) => ApiResult::Success {
                status: response.status,
                data: response.payload,
            },
            Err(error) => ApiResult::Error(error),
        }
    }

    /// Sends `request` and deserializes the JSON payload into `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestDescriptor) -> ApiResult<T> {
        self.send(request)
            .await
            .and_then(|status, payload| match serde_json::from_value(payload.into_json()) {
                Ok(data) => ApiResult::Success { status, data },
                Err(error) => ApiResult::Error(SocketError::unexpected_shape(status, &error)),
            })
    }

    async fn fetch(&self, request: &RequestDescriptor) -> Result<CachedResponse, SocketError> {
        let executor = &self.inner.executor;
        self.inner
            .retry_policy
            .run(|attempt| async move {
                let raw = executor.execute(request, attempt).await?;
                let payload = raw.decode(request.response_type())?;
                Ok(CachedResponse {
                    status: raw.status,
                    payload,
                })
            })
            .await
            .map_err(|failure| {
                let error = SocketError::from_request_error(&failure.error);
                debug!(
                    attempts = failure.attempts,
                    status = ?error.status(),
                    error = %error,
                    "request failed"
                );
                error
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ValidationError;

    #[test]
    fn test_new_rejects_blank_tokens() {
        for token in ["", "   "] {
            let error = SocketClient::new(token).unwrap_err();
            assert!(matches!(error, ValidationError::EmptyToken));
            assert!(error.to_string().contains("empty or whitespace-only"));
        }
    }

    #[test]
    fn test_token_length_limits() {
        let error = SocketClient::new(&"a".repeat(1025)).unwrap_err();
        assert!(error.to_string().contains("too long"));
        assert!(SocketClient::new(&"a".repeat(1024)).is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = SocketClient::new("super-secret-token").unwrap();
        assert!(!format!("{client:?}").contains("super-secret-token"));
    }
}
