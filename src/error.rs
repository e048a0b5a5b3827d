//! Error types for avsync-batch
//!
//! Two layers:
//! - [`ItemError`] covers everything that can go wrong while processing a single
//!   video/audio pair. These never escape the batch controller; they are recorded
//!   in the item's [`BatchEntry`](crate::types::BatchEntry).
//! - [`Error`] is the crate-level error for batch-wide failures (configuration,
//!   directory setup, run-log persistence) and for the inference client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for avsync-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for avsync-batch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "paths.output_dir")
        key: Option<String>,
    },

    /// Failure scoped to a single batch item
    #[error(transparent)]
    Item(#[from] ItemError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error talking to the inference service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The inference service answered, but not with something usable
    #[error("remote service error: {0}")]
    Remote(String),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors that fail one batch item
///
/// The `Display` text of each variant is what ends up in the run log, so it
/// carries every path and number needed to diagnose the failure.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Input path does not resolve to an existing regular file
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// The missing input path
        path: PathBuf,
    },

    /// Input extension is not allowed for its media kind
    #[error("unsupported file type {extension:?} for {}, allowed: {allowed:?}", path.display())]
    UnsupportedType {
        /// The rejected input path
        path: PathBuf,
        /// Lowercased extension found on the path (empty if none)
        extension: String,
        /// Allowed extensions for this media kind
        allowed: Vec<String>,
    },

    /// Input file exceeds the configured size ceiling
    #[error("file {} is {size} bytes, exceeding the {max} byte limit", path.display())]
    TooLarge {
        /// The oversized input path
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured maximum size in bytes
        max: u64,
    },

    /// The remote inference call itself failed
    #[error("remote call failed: {reason}")]
    RemoteCallFailed {
        /// Error text reported by the inference client
        reason: String,
    },

    /// The response is neither a sequence nor a mapping
    #[error("unrecognized response shape: {shape}")]
    UnrecognizedResponseShape {
        /// Short description of the shape that was received
        shape: String,
    },

    /// No usable output path could be extracted, or it does not exist on disk
    #[error("invalid output locator: {reason}")]
    InvalidOutputLocator {
        /// Why the locator was rejected
        reason: String,
        /// The resolved path, if resolution got that far
        path: Option<String>,
    },

    /// Moving the artifact into the output directory failed
    #[error("failed to move {} to {}: {reason}", source_path.display(), dest_path.display())]
    MoveFailed {
        /// The artifact being moved
        source_path: PathBuf,
        /// Where it was being moved to
        dest_path: PathBuf,
        /// The underlying filesystem error
        reason: String,
    },
}

/// Machine-readable classification of an [`ItemError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ItemError::FileNotFound`]
    FileNotFound,
    /// See [`ItemError::UnsupportedType`]
    UnsupportedType,
    /// See [`ItemError::TooLarge`]
    TooLarge,
    /// See [`ItemError::RemoteCallFailed`]
    RemoteCallFailed,
    /// See [`ItemError::UnrecognizedResponseShape`]
    UnrecognizedResponseShape,
    /// See [`ItemError::InvalidOutputLocator`]
    InvalidOutputLocator,
    /// See [`ItemError::MoveFailed`]
    MoveFailed,
}

impl ErrorKind {
    /// Stable code used in logs and the run report
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::RemoteCallFailed => "remote_call_failed",
            ErrorKind::UnrecognizedResponseShape => "unrecognized_response_shape",
            ErrorKind::InvalidOutputLocator => "invalid_output_locator",
            ErrorKind::MoveFailed => "move_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl ItemError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemError::FileNotFound { .. } => ErrorKind::FileNotFound,
            ItemError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            ItemError::TooLarge { .. } => ErrorKind::TooLarge,
            ItemError::RemoteCallFailed { .. } => ErrorKind::RemoteCallFailed,
            ItemError::UnrecognizedResponseShape { .. } => ErrorKind::UnrecognizedResponseShape,
            ItemError::InvalidOutputLocator { .. } => ErrorKind::InvalidOutputLocator,
            ItemError::MoveFailed { .. } => ErrorKind::MoveFailed,
        }
    }
}

impl From<Error> for ItemError {
    /// Fold a client-side error into the item that triggered it.
    fn from(error: Error) -> Self {
        match error {
            Error::Item(inner) => inner,
            other => ItemError::RemoteCallFailed {
                reason: other.to_string(),
            },
        }
    }
}
