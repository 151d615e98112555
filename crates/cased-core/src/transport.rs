//! The transport capability used to reach the Cased API.
//!
//! The publish pipeline and the query resources never talk HTTP directly; they
//! build a [`Request`] and hand it to a [`Transport`]. The HTTP implementation
//! lives in `cased-client`; tests plug in recording transports.

use std::fmt::{self, Debug};

use serde_json::Value;

use crate::error::TransportError;
use crate::payload::Payload;

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`, data is sent as query parameters.
    Get,
    /// `POST`, data is sent as a JSON body.
    Post,
    /// `PUT`, data is sent as a JSON body.
    Put,
    /// `DELETE`, data is sent as query parameters.
    Delete,
}

impl Method {
    /// Returns true when request data travels as query parameters.
    #[must_use]
    pub const fn uses_query(self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }

    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to the Cased API.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// API key sent as a bearer token, if any.
    pub api_key: Option<String>,
    /// JSON body or query parameters, depending on [`Method::uses_query`].
    pub data: Option<Payload>,
}

impl Request {
    /// Creates a request without data.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            api_key: None,
            data: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the request data.
    #[must_use]
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    /// Renders the data as query parameters.
    ///
    /// Strings are sent verbatim, every other value as its JSON text.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.data
            .iter()
            .flatten()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

/// A response from the Cased API.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status_code: u16,
    /// Decoded JSON body (`Value::Null` when the body was empty).
    pub body: Value,
}

impl Response {
    /// Creates a response.
    #[must_use]
    pub const fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Converts a non-2xx response into a [`TransportError::Status`].
    ///
    /// # Errors
    ///
    /// Returns the status error when the response is not successful.
    pub fn error_for_status(self, url: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            let body = match &self.body {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Err(TransportError::Status {
                url: url.to_string(),
                status: self.status_code,
                body,
            })
        }
    }
}

/// Sends requests to the Cased API.
///
/// Implementations are synchronous and may block on network I/O. A non-2xx
/// answer is returned as `Ok`; callers decide whether it counts as a failure.
pub trait Transport: Send + Sync + Debug {
    /// Sends a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be delivered or the
    /// response could not be read.
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}
