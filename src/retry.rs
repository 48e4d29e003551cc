//! Failure classification and the retry loop with exponential backoff.
//!
//! Every failed attempt is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - 5xx responses and transport failures; retried
//! - [`FailureType::RateLimited`] - HTTP 429; retried, honoring `Retry-After`
//! - [`FailureType::NeedsAuth`] - 401/403; never retried
//! - [`FailureType::Permanent`] - other 4xx and protocol failures; never retried
//!
//! Without a `Retry-After` hint, failed attempt `n` (0-indexed) waits
//! `retry_delay * 2^n` before the next try.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use socket_sdk::retry::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(100));
//! match policy.should_retry(FailureType::Transient, 1, None) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_millis(200));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use std::future::Future;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use crate::config::{ClientConfig, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY};
use crate::request::RequestError;

/// Longest honored `Retry-After` delay (1 hour).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Failure that no retry will fix.
    Permanent,
    /// Authentication or authorization was refused.
    NeedsAuth,
    /// The server is rate limiting (HTTP 429).
    RateLimited,
}

/// Decision taken after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The 0-indexed number of the next attempt.
        attempt: u32,
    },
    /// Stop and report the last error.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// The last error of a logical call together with the attempts spent on it.
#[derive(Debug)]
pub struct RetryFailure {
    /// The error from the final attempt.
    pub error: RequestError,
    /// Physical attempts made, including the first.
    pub attempts: u32,
}

/// Retry budget and base delay for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `retries` retries after the first attempt.
    #[must_use]
    pub fn new(retries: u32, retry_delay: Duration) -> Self {
        Self {
            retries,
            retry_delay,
        }
    }

    /// Policy configured for a client.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.retries, config.retry_delay)
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Backoff after failed attempt `attempt` (0-indexed): `retry_delay * 2^attempt`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.retry_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Decides whether failed attempt `attempt` (0-indexed) is retried.
    ///
    /// A `retry_after` hint replaces the computed backoff.
    #[instrument(level = "debug", skip(self), fields(retries = self.retries))]
    pub fn should_retry(
        &self,
        failure_type: FailureType,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "authentication refused - retry with the same token would not help"
                        .to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.retries {
            debug!(attempt, retries = self.retries, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget ({}) exhausted", self.retries),
            };
        }

        let delay = retry_after.unwrap_or_else(|| self.backoff_delay(attempt));
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Runs `operation` until it succeeds or a terminal decision is reached.
    ///
    /// The closure receives the 0-indexed attempt number. Attempts are
    /// strictly sequential.
    ///
    /// # Errors
    ///
    /// Returns [`RetryFailure`] carrying the final attempt's error.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            let retry_after = match failure_type {
                FailureType::RateLimited => retry_after_hint(&error),
                _ => None,
            };

            match self.should_retry(failure_type, attempt, retry_after) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    info!(
                        attempt = next,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, reason = %reason, "not retrying");
                    return Err(RetryFailure {
                        error,
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }
}

/// Classifies a failed attempt.
///
/// | Failure | Type |
/// |---------|------|
/// | 401, 403 | NeedsAuth |
/// | 408 | Transient |
/// | 429 | RateLimited |
/// | other 4xx | Permanent |
/// | 5xx | Transient |
/// | timeout, network (DNS, refused, reset, TLS) | Transient |
/// | upload file unreadable, invalid JSON, oversized body, bad URL or header | Permanent |
#[must_use]
pub fn classify_error(error: &RequestError) -> FailureType {
    match error {
        RequestError::HttpStatus { status, .. } => classify_http_status(*status),
        RequestError::Timeout { .. } | RequestError::Network { .. } => FailureType::Transient,
        RequestError::ResponseTooLarge { .. }
        | RequestError::UploadFile { .. }
        | RequestError::InvalidJson { .. }
        | RequestError::InvalidHeader { .. }
        | RequestError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status code.
#[allow(clippy::match_same_arms)]
#[must_use]
pub fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::NeedsAuth,
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        400..=499 => FailureType::Permanent,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// The parsed `Retry-After` of an HTTP status error, if any.
#[must_use]
pub fn retry_after_hint(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

/// Parses a `Retry-After` header value.
///
/// Accepts delay-seconds or an HTTP-date. Returns `None` for negative,
/// unparseable or past values so the caller falls back to backoff. Zero
/// seconds is an immediate retry. Delays above [`MAX_RETRY_AFTER`] are capped.
///
/// ```
/// use std::time::Duration;
/// use socket_sdk::retry::parse_retry_after;
///
/// assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
/// assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    parse_retry_after_at(header_value, SystemTime::now())
}

fn parse_retry_after_at(header_value: &str, now: SystemTime) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let Ok(date) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    if let Ok(delay) = date.duration_since(now) {
        Some(cap_retry_after(delay))
    } else {
        debug!(header_value, "Retry-After date is in the past, ignoring");
        None
    }
}

fn cap_retry_after(delay: Duration) -> Duration {
    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        return MAX_RETRY_AFTER;
    }
    delay
}
