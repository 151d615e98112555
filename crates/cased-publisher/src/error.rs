//! Error types for the publish pipeline.

use std::path::PathBuf;

use cased_core::{TransportError, ValidationError};
use thiserror::Error;

/// Errors returned by [`crate::Publisher::publish`].
///
/// The variants keep "failed to send" ([`PublishError::Transport`]) apart from
/// "failed to queue for retry" ([`PublishError::Store`]) and from invalid
/// reliability configuration ([`PublishError::ReliabilityConfig`]).
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event was not a JSON object.
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// A sensitive data handler failed. The event was not sent.
    #[error("Sensitive data handler '{handler}' failed: {reason}")]
    Redaction {
        /// Handler name.
        handler: String,
        /// Failure reason.
        reason: String,
    },

    /// A reliability backend was requested that cannot be used.
    #[error("Reliability engine misconfigured: {reason}")]
    ReliabilityConfig {
        /// Reason the backend is unusable.
        reason: String,
    },

    /// Direct delivery failed and no reliability backend was available.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Direct delivery failed and the event could not be stored for replay.
    #[error("Failed to spool event in '{backend}' ({transport}): {source}")]
    Store {
        /// Backend name.
        backend: String,
        /// Storage error.
        #[source]
        source: BackendError,
        /// The delivery failure that triggered the store.
        transport: TransportError,
    },
}

/// Errors raised by a [`crate::ReliabilityBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// File I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Event could not be (de)serialized.
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend does not support the operation.
    #[error("Backend '{backend}' does not support {operation}")]
    Unsupported {
        /// Backend name.
        backend: String,
        /// Operation name.
        operation: &'static str,
    },

    /// Backend-specific error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Failure reported by a [`crate::SensitiveDataHandler`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    /// Failure description.
    pub message: String,
}

impl HandlerError {
    /// Creates a handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
