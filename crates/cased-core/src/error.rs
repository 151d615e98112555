//! Error types for Cased core operations.
//!
//! This module defines the error types shared across the workspace: the core
//! [`Error`], the [`ValidationError`] raised for malformed caller input, and the
//! [`TransportError`] returned by [`crate::Transport`] implementations.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Cased core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caller passed a value of the wrong shape.
///
/// Raised before any network interaction and never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The argument or field that failed validation.
    pub field: String,
    /// A human-readable description of the failure.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error for an argument that had to be a JSON object.
    ///
    /// # Examples
    ///
    /// ```
    /// use cased_core::ValidationError;
    ///
    /// let error = ValidationError::expected_object("variables", "array");
    /// assert_eq!(error.to_string(), "'variables' must be an object, got array");
    /// ```
    pub fn expected_object(field: impl Into<String>, found: &str) -> Self {
        let field = field.into();
        Self {
            message: format!("must be an object, got {found}"),
            field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Failure to deliver a request to the Cased API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The API answered with a non-2xx status.
    #[error("HTTP error from {url}: {status} - {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The connection could not be established.
    #[error("Failed to connect to {url}: {reason}")]
    Connection {
        /// Request URL.
        url: String,
        /// Underlying error message.
        reason: String,
    },

    /// The request timed out.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// The request could not be built or sent.
    #[error("Request failed: {reason}")]
    Request {
        /// Error message.
        reason: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {reason}")]
    Decode {
        /// Error message.
        reason: String,
    },
}

impl TransportError {
    /// Returns the HTTP status if the API answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
