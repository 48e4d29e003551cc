//! Pre-upload readability checks and the caller's validation strategy.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::SocketError;

/// Upload candidates split by readability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidationReport {
    /// Name of the upload operation, e.g. `createOrgFullScan`.
    pub operation: String,
    /// Files that can be opened for reading.
    pub valid: Vec<PathBuf>,
    /// Files that are missing, not regular files or not readable.
    pub invalid: Vec<PathBuf>,
}

/// What to do when some upload candidates are unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileValidationDecision {
    /// Upload the readable subset.
    Proceed,
    /// Fail the call, optionally with a custom message and cause.
    Abort {
        /// Replacement for the default error message.
        error: Option<String>,
        /// Replacement for the default cause.
        cause: Option<String>,
    },
}

/// Strategy consulted before an upload when some files are unreadable.
///
/// ```
/// use async_trait::async_trait;
/// use socket_sdk::client::{FileValidationDecision, FileValidationReport, FileValidator};
///
/// struct Strict;
///
/// #[async_trait]
/// impl FileValidator for Strict {
///     async fn validate(&self, report: &FileValidationReport) -> FileValidationDecision {
///         FileValidationDecision::Abort {
///             error: Some(format!("{} unreadable files", report.invalid.len())),
///             cause: None,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait FileValidator: Send + Sync {
    /// Decides whether the upload goes ahead.
    async fn validate(&self, report: &FileValidationReport) -> FileValidationDecision;
}

async fn is_readable(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => tokio::fs::File::open(path).await.is_ok(),
        Ok(_) => false,
        Err(error) => {
            debug!(path = %path.display(), error = %error, "upload candidate not accessible");
            false
        }
    }
}

/// Splits `paths` into readable and unreadable files, preserving order.
pub async fn partition_readable(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut valid = Vec::with_capacity(paths.len());
    let mut invalid = Vec::new();
    for path in paths {
        if is_readable(path).await {
            valid.push(path.clone());
        } else {
            invalid.push(path.clone());
        }
    }
    (valid, invalid)
}

fn unreadable_cause(invalid: &[PathBuf]) -> String {
    let mut cause = String::from("→ Unreadable files:");
    for path in invalid {
        cause.push_str("\n→   ");
        cause.push_str(&path.display().to_string());
    }
    cause
}

/// Returns the files to upload for `operation`.
///
/// With no validator, unreadable files are skipped with a warning.
///
/// # Errors
///
/// Fails when the validator aborts or when no file is readable.
#[instrument(level = "debug", skip(validator, paths), fields(files = paths.len()))]
pub(crate) async fn select_upload_files(
    validator: Option<&dyn FileValidator>,
    operation: &str,
    paths: &[PathBuf],
) -> Result<Vec<PathBuf>, SocketError> {
    let (valid, invalid) = partition_readable(paths).await;
    if invalid.is_empty() && !valid.is_empty() {
        return Ok(valid);
    }

    if !invalid.is_empty() {
        match validator {
            Some(validator) => {
                let report = FileValidationReport {
                    operation: operation.to_string(),
                    valid: valid.clone(),
                    invalid: invalid.clone(),
                };
                if let FileValidationDecision::Abort { error, cause } =
                    validator.validate(&report).await
                {
                    let message = error.unwrap_or_else(|| {
                        format!(
                            "{operation} aborted: {} of {} files could not be read",
                            invalid.len(),
                            paths.len()
                        )
                    });
                    return Err(SocketError::file_validation(
                        message,
                        Some(cause.unwrap_or_else(|| unreadable_cause(&invalid))),
                    ));
                }
            }
            None => {
                for path in &invalid {
                    warn!(operation, path = %path.display(), "skipping unreadable upload file");
                }
            }
        }
    }

    if valid.is_empty() {
        return Err(SocketError::file_validation(
            format!("{operation} has no readable files to upload"),
            (!invalid.is_empty()).then(|| unreadable_cause(&invalid)),
        ));
    }
    Ok(valid)
}
