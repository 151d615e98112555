//! HTTP transport backed by reqwest.

use std::time::Duration;

use cased_core::{library_name, ClientConfig, Method, Request, Response, Transport, TransportError};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{transport_error, ClientError};

/// Blocking HTTP transport for the Cased API.
///
/// Sends the API key as a bearer token and identifies itself as
/// `cased-rust/<version>`. Requests are not retried.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(library_name())
            .build()
            .map_err(|e| ClientError::Configuration {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, timeout })
    }

    /// Creates a transport using the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(config.timeout)
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build(
        &self,
        request: &Request,
    ) -> Result<reqwest::blocking::RequestBuilder, TransportError> {
        let mut url = Url::parse(&request.url).map_err(|e| TransportError::Request {
            reason: format!("Invalid URL '{}': {e}", request.url),
        })?;

        if request.method.uses_query() {
            let pairs = request.query_pairs();
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, url);
        if let Some(key) = &request.api_key {
            builder = builder.bearer_auth(key);
        }
        if !request.method.uses_query() {
            if let Some(data) = &request.data {
                builder = builder.json(data);
            }
        }

        Ok(builder)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let builder = self.build(request)?;

        debug!(method = %request.method, url = %request.url, "Sending request");
        let response = builder
            .send()
            .map_err(|e| transport_error(&e, &request.url))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| transport_error(&e, &request.url))?;
        debug!(url = %request.url, status, "Received response");

        Ok(Response::new(status, decode_body(text)))
    }
}

/// Decodes a response body, keeping non-JSON bodies as text.
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
