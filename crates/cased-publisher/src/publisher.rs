//! Publisher: the publish operation end to end.

use std::sync::Arc;

use cased_core::{deep_merge, expect_object, ClientConfig, Payload, Request, Transport};
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::context::Context;
use crate::error::PublishError;
use crate::plugins::{DataPlugin, PluginPipeline};
use crate::reliability::{
    BackendSelection, PublishOutcome, ReliabilityBackend, ReliabilityEngine, StoreFailurePolicy,
};
use crate::sensitive::{
    FieldRedaction, RedactionMode, SensitiveDataHandler, SensitiveDataPipeline,
};

/// Identity field holding the per-publish unique id.
pub const CASED_ID_FIELD: &str = "cased_id";

/// Identity field holding the send time.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Runtime switches for the publish operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishSettings {
    /// Publishing is a silent no-op.
    pub disable_publishing: bool,
    /// Clear the context after every publish, whatever its outcome.
    pub clear_context_after_publishing: bool,
    /// Log a warning for publishes without a reliability backend.
    pub warn_if_no_reliability_backend: bool,
    /// Redact sensitive data instead of annotating it.
    pub delete_pii: bool,
}

impl From<&ClientConfig> for PublishSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            disable_publishing: config.disable_publishing,
            clear_context_after_publishing: config.clear_context_after_publishing,
            warn_if_no_reliability_backend: config.warn_if_no_reliability_backend,
            delete_pii: config.delete_pii,
        }
    }
}

/// Publishes events through plugins, context, redaction and the reliability
/// engine.
///
/// A publisher owns all pipeline state and is safe to share through `Arc`.
#[derive(Debug)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    publish_url: String,
    publish_key: Option<String>,
    settings: RwLock<PublishSettings>,
    context: Context,
    plugins: PluginPipeline,
    sensitive: SensitiveDataPipeline,
    reliability: ReliabilityEngine,
}

impl Publisher {
    /// Creates a builder sending through `transport`.
    #[must_use]
    pub fn builder(transport: Arc<dyn Transport>) -> PublisherBuilder {
        PublisherBuilder::new(transport)
    }

    /// Publishes an event, falling back to the default reliability backend.
    ///
    /// Returns `Ok(None)` when publishing is disabled.
    ///
    /// # Errors
    ///
    /// See [`Publisher::publish_with`].
    pub fn publish(&self, data: Value) -> Result<Option<PublishOutcome>, PublishError> {
        self.publish_with(data, &BackendSelection::Default)
    }

    /// Publishes an event with an explicit reliability backend selection.
    ///
    /// Returns `Ok(None)` when publishing is disabled, without contacting the
    /// transport.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Validation`] if `data` is not a JSON object
    /// - [`PublishError::Redaction`] if a sensitive data handler fails
    /// - [`PublishError::Transport`] if delivery fails and no backend is usable
    /// - [`PublishError::Store`] if delivery fails and the backend cannot
    ///   store the event
    pub fn publish_with(
        &self,
        data: Value,
        backend: &BackendSelection,
    ) -> Result<Option<PublishOutcome>, PublishError> {
        let event = expect_object(data, "data")?;
        let settings = self.settings();

        if settings.disable_publishing {
            debug!("Publishing disabled, skipping event");
            return Ok(None);
        }

        let result = self.deliver(event, backend, settings);

        if settings.clear_context_after_publishing {
            self.context.clear();
        }

        result.map(Some)
    }

    /// Builds the payload that would be sent for `data`, without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Validation`] or [`PublishError::Redaction`].
    pub fn prepare(&self, data: Value) -> Result<Payload, PublishError> {
        let event = expect_object(data, "data")?;
        self.prepare_event(event, self.settings())
    }

    fn deliver(
        &self,
        event: Payload,
        backend: &BackendSelection,
        settings: PublishSettings,
    ) -> Result<PublishOutcome, PublishError> {
        let payload = self.prepare_event(event, settings)?;
        let request = Request::post(self.publish_url.clone())
            .with_api_key(self.publish_key.clone())
            .with_data(payload);

        self.reliability.publish_with_reliability(
            &request,
            backend,
            self.transport.as_ref(),
            settings.warn_if_no_reliability_backend,
        )
    }

    fn prepare_event(
        &self,
        event: Payload,
        settings: PublishSettings,
    ) -> Result<Payload, PublishError> {
        let mut payload = self.plugins.defaults(&event);
        deep_merge(&mut payload, self.context.snapshot());
        deep_merge(&mut payload, event);

        let mut payload = self
            .sensitive
            .apply(payload, RedactionMode::from_delete_pii(settings.delete_pii))?;

        stamp_identity(&mut payload);
        Ok(payload)
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> PublishSettings {
        *self.settings.read()
    }

    /// Updates settings in place.
    pub fn update_settings(&self, update: impl FnOnce(&mut PublishSettings)) {
        update(&mut self.settings.write());
    }

    /// Context merged into every event.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Registered data plugins.
    #[must_use]
    pub const fn plugins(&self) -> &PluginPipeline {
        &self.plugins
    }

    /// Sensitive data handlers and fields.
    #[must_use]
    pub const fn sensitive_data(&self) -> &SensitiveDataPipeline {
        &self.sensitive
    }

    /// Reliability backends.
    #[must_use]
    pub const fn reliability(&self) -> &ReliabilityEngine {
        &self.reliability
    }

    /// URL events are posted to.
    #[must_use]
    pub fn publish_url(&self) -> &str {
        &self.publish_url
    }
}

/// Adds `cased_id` and `timestamp`, replacing any earlier values.
fn stamp_identity(payload: &mut Payload) {
    let id = Uuid::now_v7();
    payload.insert(
        CASED_ID_FIELD.to_string(),
        Value::String(id.simple().to_string()),
    );
    payload.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
}

/// Builder for [`Publisher`].
#[derive(Debug)]
pub struct PublisherBuilder {
    transport: Arc<dyn Transport>,
    publish_base: String,
    publish_key: Option<String>,
    settings: PublishSettings,
    field_redaction: FieldRedaction,
    store_failure_policy: StoreFailurePolicy,
    backends: Vec<Arc<dyn ReliabilityBackend>>,
    default_backend: BackendSelection,
    plugins: Vec<Arc<dyn DataPlugin>>,
    handlers: Vec<Arc<dyn SensitiveDataHandler>>,
    sensitive_fields: Vec<String>,
}

impl PublisherBuilder {
    /// Creates a builder with default endpoints and settings.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            publish_base: cased_core::DEFAULT_PUBLISH_BASE.to_string(),
            publish_key: None,
            settings: PublishSettings::default(),
            field_redaction: FieldRedaction::default(),
            store_failure_policy: StoreFailurePolicy::default(),
            backends: Vec::new(),
            default_backend: BackendSelection::Default,
            plugins: Vec::new(),
            handlers: Vec::new(),
            sensitive_fields: Vec::new(),
        }
    }

    /// Applies endpoint, key, flags and default backend name from `config`.
    #[must_use]
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.publish_base.clone_from(&config.publish_base);
        self.publish_key.clone_from(&config.publish_key);
        self.settings = PublishSettings::from(config);
        if let Some(name) = &config.reliability_backend {
            self.default_backend = BackendSelection::Named(name.clone());
        }
        self
    }

    /// Sets the publish endpoint base URL.
    #[must_use]
    pub fn publish_base(mut self, base: impl Into<String>) -> Self {
        self.publish_base = base.into();
        self
    }

    /// Sets the publish key.
    #[must_use]
    pub fn publish_key(mut self, key: impl Into<String>) -> Self {
        self.publish_key = Some(key.into());
        self
    }

    /// Sets the runtime settings.
    #[must_use]
    pub const fn settings(mut self, settings: PublishSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets how sensitive fields are redacted when PII is deleted.
    #[must_use]
    pub const fn field_redaction(mut self, redaction: FieldRedaction) -> Self {
        self.field_redaction = redaction;
        self
    }

    /// Sets what happens when a backend cannot store a deferred event.
    #[must_use]
    pub const fn store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.store_failure_policy = policy;
        self
    }

    /// Registers a reliability backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn ReliabilityBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Selects the default reliability backend.
    #[must_use]
    pub fn default_backend(mut self, selection: BackendSelection) -> Self {
        self.default_backend = selection;
        self
    }

    /// Appends a data plugin after the default one.
    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn DataPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Appends a sensitive data handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn SensitiveDataHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Marks a field name as sensitive.
    #[must_use]
    pub fn with_sensitive_field(mut self, field: impl Into<String>) -> Self {
        self.sensitive_fields.push(field.into());
        self
    }

    /// Builds the publisher.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::ReliabilityConfig`] if the default backend is
    /// named but not registered.
    pub fn build(self) -> Result<Publisher, PublishError> {
        let reliability = ReliabilityEngine::with_store_failure_policy(self.store_failure_policy);
        for backend in self.backends {
            reliability.register_backend(backend);
        }
        reliability.set_default_backend(self.default_backend)?;

        let plugins = PluginPipeline::new();
        for plugin in self.plugins {
            plugins.add_plugin(plugin);
        }

        let sensitive = SensitiveDataPipeline::with_field_redaction(self.field_redaction);
        for handler in self.handlers {
            sensitive.add_handler(handler);
        }
        for field in self.sensitive_fields {
            sensitive.add_sensitive_field(field);
        }

        let publish_url = format!("{}/", self.publish_base.trim_end_matches('/'));

        Ok(Publisher {
            transport: self.transport,
            publish_url,
            publish_key: self.publish_key,
            settings: RwLock::new(self.settings),
            context: Context::new(),
            plugins,
            sensitive,
            reliability,
        })
    }
}
