//! Client entry point: configuration, transport and publisher in one place.

use std::sync::Arc;

use cased_core::{ClientConfig, Payload, Request, Response, Transport};
use cased_publisher::{
    FileBackend, FileBackendConfig, InMemoryBackend, Publisher, ReliabilityBackend,
};
use tracing::debug;

use crate::error::ClientError;
use crate::events::Events;
use crate::transport::HttpTransport;

/// Client for the Cased API.
///
/// Reads go through the policy-key requestor against the API base; events
/// are published through the owned [`Publisher`].
#[derive(Debug)]
pub struct CasedClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    publisher: Publisher,
}

impl CasedClient {
    /// Creates a client sending over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the
    /// configured reliability backend is not available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cased_client::CasedClient;
    /// use cased_core::ClientConfig;
    ///
    /// let config = ClientConfig::new().with_policy_key("policy_test_abc");
    /// let client = CasedClient::new(config)?;
    /// let events = client.events().list(&Default::default(), None)?;
    /// # Ok::<(), cased_client::ClientError>(())
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::from_config(&config)?);
        Self::with_transport(config, transport)
    }

    /// Creates an HTTP client from `CASED_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid values.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Creates a client sending through `transport`.
    ///
    /// A configured reliability backend name must be one of the bundled
    /// backends ([`InMemoryBackend::NAME`], [`FileBackend::NAME`]); use
    /// [`CasedClient::with_publisher`] to register others.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured reliability backend is unknown or
    /// cannot be created.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let mut builder = Publisher::builder(Arc::clone(&transport)).config(&config);
        if let Some(name) = &config.reliability_backend {
            if let Some(backend) = bundled_backend(name)? {
                builder = builder.with_backend(backend);
            }
        }
        let publisher = builder.build()?;

        Ok(Self::with_publisher(config, transport, publisher))
    }

    /// Creates a client around an already built publisher.
    #[must_use]
    pub fn with_publisher(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        publisher: Publisher,
    ) -> Self {
        Self {
            config,
            transport,
            publisher,
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Publisher used for [`Events::publish`].
    #[must_use]
    pub const fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Event resource.
    #[must_use]
    pub const fn events(&self) -> Events<'_> {
        Events::new(self)
    }

    /// Absolute API URL for `path`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Resolves the key for a read request.
    ///
    /// An explicit key wins, then the named policy key, then the default one.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingApiKey`] when no key is available.
    pub fn policy_key(
        &self,
        api_key: Option<&str>,
        policy: Option<&str>,
    ) -> Result<String, ClientError> {
        api_key
            .or_else(|| self.config.policy_key_for(policy))
            .map(ToString::to_string)
            .ok_or(ClientError::MissingApiKey { purpose: "policy" })
    }

    /// Sends a `GET` request and checks the status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] on delivery failure or a non-2xx
    /// status.
    pub fn get(
        &self,
        url: String,
        api_key: String,
        params: Option<Payload>,
    ) -> Result<Response, ClientError> {
        let mut request = Request::get(url).with_api_key(Some(api_key));
        if let Some(params) = params {
            request = request.with_data(params);
        }

        let response = self.transport.send(&request)?;
        debug!(url = %request.url, status = response.status_code, "API request completed");
        Ok(response.error_for_status(&request.url)?)
    }
}

/// Creates a bundled reliability backend by name.
fn bundled_backend(name: &str) -> Result<Option<Arc<dyn ReliabilityBackend>>, ClientError> {
    let backend: Arc<dyn ReliabilityBackend> = match name {
        InMemoryBackend::NAME => Arc::new(InMemoryBackend::new()),
        FileBackend::NAME => Arc::new(
            FileBackend::new(FileBackendConfig::default()).map_err(|e| {
                ClientError::Configuration {
                    reason: format!("Failed to create spool backend: {e}"),
                }
            })?,
        ),
        _ => return Ok(None),
    };
    Ok(Some(backend))
}
