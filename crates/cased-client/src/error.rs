//! Error types for API operations.

use cased_core::{TransportError, ValidationError};
use cased_publisher::PublishError;
use thiserror::Error;

/// Errors that can occur when talking to the Cased API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A caller argument had the wrong shape. Raised before any request.
    #[error("Invalid argument: {0}")]
    Validation(#[from] ValidationError),

    /// No API key was given or configured for the operation.
    #[error("No {purpose} key configured")]
    MissingApiKey {
        /// Which kind of key was needed.
        purpose: &'static str,
    },

    /// The request failed or the API answered with an error status.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Publishing an event failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The API answered with a body that could not be decoded.
    #[error("Failed to decode API response: {reason}")]
    Decode {
        /// Underlying error message.
        reason: String,
    },

    /// The client could not be configured.
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason the configuration is invalid.
        reason: String,
    },
}

impl From<cased_core::Error> for ClientError {
    fn from(err: cased_core::Error) -> Self {
        match err {
            cased_core::Error::InvalidInput(e) => Self::Validation(e),
            cased_core::Error::Serialization(e) => Self::Decode {
                reason: e.to_string(),
            },
            cased_core::Error::Configuration { reason } => Self::Configuration { reason },
        }
    }
}

/// Classifies a reqwest failure for `url`.
pub(crate) fn transport_error(err: &reqwest::Error, url: &str) -> TransportError {
    let url = err
        .url()
        .map_or_else(|| url.to_string(), ToString::to_string);

    if err.is_timeout() {
        TransportError::Timeout { url }
    } else if err.is_connect() {
        TransportError::Connection {
            url,
            reason: err.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        TransportError::Decode {
            reason: err.to_string(),
        }
    } else {
        TransportError::Request {
            reason: err.to_string(),
        }
    }
}
