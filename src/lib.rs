//! Socket SDK
//!
//! A resilient, typed client runtime for the Socket security-analysis API.
//! Every endpoint call flows through one engine: an HTTP executor with
//! authentication, timeouts and observation hooks, a retry policy honoring
//! `Retry-After`, an optional TTL response cache, streaming multipart
//! uploads and a bounded-concurrency queue for batch fan-out.
//!
//! # Architecture
//!
//! - [`config`] - Client options, validation and cache TTL settings
//! - [`request`] - Request descriptors and the HTTP executor
//! - [`retry`] - Failure classification and exponential backoff
//! - [`cache`] - Read-through TTL response cache
//! - [`multipart`] - Streaming `multipart/form-data` bodies
//! - [`queue`] - Bounded-concurrency task queue
//! - [`summarize`] - Redundant error-cause suppression
//! - [`client`] - [`SocketClient`] and endpoint wrappers
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use socket_sdk::{ClientOptions, SocketClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ClientOptions::default()
//!     .retries(5)
//!     .cache(true)
//!     .timeout(Duration::from_secs(60));
//! let client = SocketClient::with_options("sktsec_token", options)?;
//!
//! match client.get_quota().await {
//!     socket_sdk::ApiResult::Success { data, .. } => println!("quota: {}", data.quota),
//!     socket_sdk::ApiResult::Error(error) => eprintln!("{}", error.report()),
//! }
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod multipart;
pub mod queue;
pub mod request;
pub mod result;
pub mod retry;
pub mod summarize;
pub mod types;
pub mod user_agent;

// Re-export commonly used types
pub use client::{
    BatchStreamOptions, FileValidationDecision, FileValidationReport, FileValidator, SocketClient,
};
pub use config::{CacheTtl, ClientConfig, ClientOptions, ValidationError};
pub use error::{ErrorKind, SocketError};
pub use queue::{ConcurrencyQueue, QueueError, TaskHandle};
pub use request::{
    Method, RequestDescriptor, RequestError, RequestHooks, RequestInfo, ResponseInfo,
    ResponseType,
};
pub use result::{ApiResult, ApiValue, Payload};
pub use retry::{FailureType, RetryDecision, RetryPolicy};
pub use summarize::{calculate_word_set_similarity, filter_redundant_cause, should_omit_reason};
