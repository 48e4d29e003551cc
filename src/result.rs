//! Result shapes returned by every endpoint method.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SocketError;

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single JSON document.
    Json(Value),
    /// Raw text.
    Text(String),
    /// Newline-delimited JSON documents, in body order.
    JsonLines(Vec<Value>),
}

impl Payload {
    /// The payload as one JSON value; NDJSON becomes an array and text a string.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
            Self::JsonLines(values) => Value::Array(values),
        }
    }
}

/// A JSON value that is either a known shape or kept verbatim.
///
/// The API is free to grow fields and variants; anything that does not
/// deserialize into `T` is preserved as [`ApiValue::Opaque`] instead of
/// failing the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiValue<T> {
    /// Deserialized into the known shape.
    Known(T),
    /// Unrecognized payload, kept as raw JSON.
    Opaque(Value),
}

impl<T> ApiValue<T> {
    /// The known value, if deserialization succeeded.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Opaque(_) => None,
        }
    }
}

/// Outcome of an API call in "return" mode.
///
/// Every failure reaching the caller has the same wording it would have in
/// "throw" mode; [`ApiResult::into_result`] switches between the two.
#[derive(Debug, Clone)]
#[must_use = "API results carry errors that should be inspected"]
pub enum ApiResult<T> {
    /// The call succeeded.
    Success {
        /// HTTP status of the successful response.
        status: u16,
        /// Decoded response body.
        data: T,
    },
    /// The call failed.
    Error(SocketError),
}

impl<T> ApiResult<T> {
    /// Whether the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// HTTP status, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } => Some(*status),
            Self::Error(error) => error.status(),
        }
    }

    /// The error, if the call failed.
    #[must_use]
    pub fn error(&self) -> Option<&SocketError> {
        match self {
            Self::Success { .. } => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Converts to a `Result`, raising the error in "throw" mode.
    ///
    /// # Errors
    ///
    /// Returns the contained [`SocketError`] for failed calls.
    pub fn into_result(self) -> Result<T, SocketError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Error(error) => Err(error),
        }
    }

    /// Maps the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            Self::Success { status, data } => ApiResult::Success {
                status,
                data: f(data),
            },
            Self::Error(error) => ApiResult::Error(error),
        }
    }

    /// Maps the success value with a fallible conversion.
    pub fn and_then<U>(self, f: impl FnOnce(u16, T) -> ApiResult<U>) -> ApiResult<U> {
        match self {
            Self::Success { status, data } => f(status, data),
            Self::Error(error) => ApiResult::Error(error),
        }
    }
}

impl<T> From<Result<T, SocketError>> for ApiResult<T> {
    fn from(result: Result<T, SocketError>) -> Self {
        match result {
            Ok(data) => Self::Success { status: 200, data },
            Err(error) => Self::Error(error),
        }
    }
}
