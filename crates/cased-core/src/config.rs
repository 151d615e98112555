//! Client configuration.
//!
//! Keys, endpoints and feature flags are read once at initialization, either
//! from the process environment ([`ClientConfig::from_env`]) or built up with
//! the `with_*` methods.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default base URL for query endpoints.
pub const DEFAULT_API_BASE: &str = "https://api.cased.com";

/// Default base URL for the publish endpoint.
pub const DEFAULT_PUBLISH_BASE: &str = "https://publish.cased.com";

const PUBLISH_KEY_VAR: &str = "CASED_PUBLISH_KEY";
const POLICY_KEY_VAR: &str = "CASED_POLICY_KEY";
const POLICY_KEY_PREFIX: &str = "CASED_POLICY_KEY_";

/// Configuration for the Cased client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Key used to publish events.
    pub publish_key: Option<String>,

    /// Default policy key, used for queries.
    pub policy_key: Option<String>,

    /// Named policy keys for multi-tenant lookups (name => key).
    pub policy_keys: BTreeMap<String, String>,

    /// Base URL for query endpoints.
    pub api_base: String,

    /// Base URL for the publish endpoint.
    pub publish_base: String,

    /// Optional client identifier.
    pub client_id: Option<String>,

    /// When set, publishing is a silent no-op.
    pub disable_publishing: bool,

    /// Clear the context after every publish.
    pub clear_context_after_publishing: bool,

    /// Log a warning for publishes without a reliability backend.
    pub warn_if_no_reliability_backend: bool,

    /// Redact sensitive fields instead of annotating them.
    pub delete_pii: bool,

    /// Name of the default reliability backend.
    pub reliability_backend: Option<String>,

    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Creates a configuration with default endpoints and no keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use cased_core::ClientConfig;
    ///
    /// let config = ClientConfig::new();
    /// assert_eq!(config.api_base, "https://api.cased.com");
    /// assert!(config.publish_key.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            publish_key: None,
            policy_key: None,
            policy_keys: BTreeMap::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            publish_base: DEFAULT_PUBLISH_BASE.to_string(),
            client_id: None,
            disable_publishing: false,
            clear_context_after_publishing: false,
            warn_if_no_reliability_backend: false,
            delete_pii: false,
            reliability_backend: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a flag or endpoint variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Loads configuration from an iterator of `(name, value)` pairs.
    ///
    /// Recognised variables: `CASED_PUBLISH_KEY`, `CASED_POLICY_KEY`,
    /// `CASED_POLICY_KEY_<NAME>`, `CASED_API_BASE`, `CASED_PUBLISH_BASE`,
    /// `CASED_CLIENT_ID`, `CASED_RELIABILITY_BACKEND`, `CASED_TIMEOUT_SECS`
    /// and the boolean flags `CASED_DISABLE_PUBLISHING`,
    /// `CASED_CLEAR_CONTEXT_AFTER_PUBLISHING`,
    /// `CASED_WARN_IF_NO_RELIABILITY_BACKEND` and `CASED_DELETE_PII`.
    ///
    /// # Errors
    ///
    /// Returns an error if a flag or endpoint variable holds an invalid value.
    ///
    /// # Examples
    ///
    /// ```
    /// use cased_core::ClientConfig;
    ///
    /// let config = ClientConfig::from_vars([
    ///     ("CASED_PUBLISH_KEY".to_string(), "publish_test_abc".to_string()),
    ///     ("CASED_POLICY_KEY_SECONDARY".to_string(), "policy_test_2".to_string()),
    /// ])?;
    /// assert_eq!(config.publish_key.as_deref(), Some("publish_test_abc"));
    /// assert_eq!(config.policy_key_for(Some("secondary")), Some("policy_test_2"));
    /// # Ok::<(), cased_core::Error>(())
    /// ```
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::new();

        for (name, value) in vars {
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                PUBLISH_KEY_VAR => config.publish_key = Some(value),
                POLICY_KEY_VAR => config.policy_key = Some(value),
                "CASED_API_BASE" => config.api_base = parse_base_url(&name, &value)?,
                "CASED_PUBLISH_BASE" => config.publish_base = parse_base_url(&name, &value)?,
                "CASED_CLIENT_ID" => config.client_id = Some(value),
                "CASED_RELIABILITY_BACKEND" => config.reliability_backend = Some(value),
                "CASED_TIMEOUT_SECS" => {
                    let secs = value.parse::<u64>().map_err(|_| Error::Configuration {
                        reason: format!("{name} must be a whole number of seconds, got '{value}'"),
                    })?;
                    config.timeout = Duration::from_secs(secs);
                }
                "CASED_DISABLE_PUBLISHING" => {
                    config.disable_publishing = parse_flag(&name, &value)?;
                }
                "CASED_CLEAR_CONTEXT_AFTER_PUBLISHING" => {
                    config.clear_context_after_publishing = parse_flag(&name, &value)?;
                }
                "CASED_WARN_IF_NO_RELIABILITY_BACKEND" => {
                    config.warn_if_no_reliability_backend = parse_flag(&name, &value)?;
                }
                "CASED_DELETE_PII" => config.delete_pii = parse_flag(&name, &value)?,
                other => {
                    if let Some(key_name) = other.strip_prefix(POLICY_KEY_PREFIX) {
                        config
                            .policy_keys
                            .insert(key_name.to_lowercase(), value);
                    }
                }
            }
        }

        tracing::debug!(
            api_base = %config.api_base,
            publish_base = %config.publish_base,
            named_policy_keys = config.policy_keys.len(),
            "Loaded client configuration"
        );

        Ok(config)
    }

    /// Sets the publish key.
    #[must_use]
    pub fn with_publish_key(mut self, key: impl Into<String>) -> Self {
        self.publish_key = Some(key.into());
        self
    }

    /// Sets the default policy key.
    #[must_use]
    pub fn with_policy_key(mut self, key: impl Into<String>) -> Self {
        self.policy_key = Some(key.into());
        self
    }

    /// Adds a named policy key.
    #[must_use]
    pub fn with_named_policy_key(
        mut self,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.policy_keys.insert(name.into(), key.into());
        self
    }

    /// Sets the query endpoint base URL.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = trim_base(base.into());
        self
    }

    /// Sets the publish endpoint base URL.
    #[must_use]
    pub fn with_publish_base(mut self, base: impl Into<String>) -> Self {
        self.publish_base = trim_base(base.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the default reliability backend name.
    #[must_use]
    pub fn with_reliability_backend(mut self, name: impl Into<String>) -> Self {
        self.reliability_backend = Some(name.into());
        self
    }

    /// Resolves a policy key by name.
    ///
    /// A named lookup that misses falls back to the default policy key.
    #[must_use]
    pub fn policy_key_for(&self, name: Option<&str>) -> Option<&str> {
        name.and_then(|n| self.policy_keys.get(n))
            .or(self.policy_key.as_ref())
            .map(String::as_str)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration {
            reason: format!("{name} must be a boolean, got '{value}'"),
        }),
    }
}

fn parse_base_url(name: &str, value: &str) -> Result<String> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(trim_base(value.to_string()))
    } else {
        Err(Error::Configuration {
            reason: format!("{name} must be an http(s) URL, got '{value}'"),
        })
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}
