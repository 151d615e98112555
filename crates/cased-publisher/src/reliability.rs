//! Reliability engine.
//!
//! Wraps a single delivery attempt with an optional durable fallback. A
//! successful direct send never touches the backend; a failed one is handed
//! to the resolved backend for later replay by an external drain process.
//!
//! ```text
//! Pending ──send ok──────────────────────▶ Sent
//!    │
//!    └──send failed──┬─backend stored────▶ Deferred
//!                    └─no backend────────▶ Failed
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use cased_core::{Payload, Request, Response, Transport, TransportError};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{BackendError, PublishError};

/// Durable storage for events whose direct delivery failed.
///
/// Implementations must be safe to call from several threads at once.
pub trait ReliabilityBackend: Send + Sync + Debug {
    /// Name the backend is registered and selected under.
    fn name(&self) -> &str;

    /// Stores an event for later replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be stored.
    fn store(&self, event: &Payload) -> Result<(), BackendError>;

    /// Removes and returns every stored event, oldest first.
    ///
    /// # Errors
    ///
    /// The default implementation reports the operation as unsupported.
    fn drain(&self) -> Result<Vec<Payload>, BackendError> {
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "drain",
        })
    }
}

/// Which backend a publish should fall back to.
#[derive(Clone, Default)]
pub enum BackendSelection {
    /// Use the engine's configured default backend, if any.
    #[default]
    Default,
    /// Use the registered backend with this name.
    Named(String),
    /// Use this backend instance.
    Backend(Arc<dyn ReliabilityBackend>),
    /// Direct send only.
    Disabled,
}

impl Debug for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Backend(backend) => f.debug_tuple("Backend").field(&backend.name()).finish(),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

impl From<&str> for BackendSelection {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Arc<dyn ReliabilityBackend>> for BackendSelection {
    fn from(backend: Arc<dyn ReliabilityBackend>) -> Self {
        Self::Backend(backend)
    }
}

/// What to do when a backend fails to store a deferred event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailurePolicy {
    /// Return [`PublishError::Store`].
    #[default]
    Raise,
    /// Log the store failure and return the original transport error.
    SurfaceTransportError,
}

/// State of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Not yet attempted.
    Pending,
    /// Delivered directly.
    Sent,
    /// Direct delivery failed, stored for replay.
    Deferred,
    /// Direct delivery failed, nothing stored.
    Failed,
}

/// Result of a delivery that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// The API accepted the event.
    Sent(Response),
    /// Delivery failed and the event was stored for replay.
    Deferred {
        /// Backend holding the event.
        backend: String,
        /// The delivery failure.
        error: TransportError,
    },
}

impl PublishOutcome {
    /// Terminal delivery state.
    #[must_use]
    pub const fn state(&self) -> DeliveryState {
        match self {
            Self::Sent(_) => DeliveryState::Sent,
            Self::Deferred { .. } => DeliveryState::Deferred,
        }
    }

    /// API response, for direct deliveries.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Sent(response) => Some(response),
            Self::Deferred { .. } => None,
        }
    }

    /// Returns true when the event was stored for replay.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

/// Registry of reliability backends plus the default selection.
#[derive(Debug, Default)]
pub struct ReliabilityEngine {
    backends: RwLock<BTreeMap<String, Arc<dyn ReliabilityBackend>>>,
    default_backend: RwLock<Option<Arc<dyn ReliabilityBackend>>>,
    store_failure_policy: StoreFailurePolicy,
}

impl ReliabilityEngine {
    /// Creates an engine with no backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given store failure policy.
    #[must_use]
    pub fn with_store_failure_policy(policy: StoreFailurePolicy) -> Self {
        Self {
            store_failure_policy: policy,
            ..Self::default()
        }
    }

    /// Store failure policy.
    #[must_use]
    pub const fn store_failure_policy(&self) -> StoreFailurePolicy {
        self.store_failure_policy
    }

    /// Registers a backend under its name, replacing any previous one.
    pub fn register_backend(&self, backend: Arc<dyn ReliabilityBackend>) {
        let name = backend.name().to_string();
        debug!(backend = %name, "Registered reliability backend");
        self.backends.write().insert(name, backend);
    }

    /// Looks up a registered backend.
    #[must_use]
    pub fn backend(&self, name: &str) -> Option<Arc<dyn ReliabilityBackend>> {
        self.backends.read().get(name).cloned()
    }

    /// Names of registered backends, sorted.
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.read().keys().cloned().collect()
    }

    /// Sets the default backend.
    ///
    /// Instances are registered as a side effect. `Default` leaves the
    /// current default in place.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::ReliabilityConfig`] when a named backend is not
    /// registered.
    pub fn set_default_backend(&self, selection: BackendSelection) -> Result<(), PublishError> {
        let resolved = match selection {
            BackendSelection::Default => return Ok(()),
            BackendSelection::Disabled => None,
            BackendSelection::Named(name) => {
                let backend = self.backend(&name).ok_or_else(|| PublishError::ReliabilityConfig {
                    reason: format!(
                        "backend '{name}' is not registered (known: {})",
                        self.backend_names().join(", ")
                    ),
                })?;
                Some(backend)
            }
            BackendSelection::Backend(backend) => {
                self.register_backend(Arc::clone(&backend));
                Some(backend)
            }
        };

        *self.default_backend.write() = resolved;
        Ok(())
    }

    /// The configured default backend.
    #[must_use]
    pub fn default_backend(&self) -> Option<Arc<dyn ReliabilityBackend>> {
        self.default_backend.read().clone()
    }

    /// Resolves a per-call selection to a usable backend.
    ///
    /// An unknown name is not an error: it is logged and resolution falls
    /// back to the default backend, then to direct send only.
    #[must_use]
    pub fn resolve(&self, selection: &BackendSelection) -> Option<Arc<dyn ReliabilityBackend>> {
        match selection {
            BackendSelection::Default => self.default_backend(),
            BackendSelection::Disabled => None,
            BackendSelection::Backend(backend) => Some(Arc::clone(backend)),
            BackendSelection::Named(name) => self.backend(name).or_else(|| {
                warn!(
                    backend = %name,
                    "Requested reliability backend is not registered, falling back"
                );
                self.default_backend()
            }),
        }
    }

    /// Sends `request` and falls back to durable storage if delivery fails.
    ///
    /// The stored event is the request data.
    ///
    /// # Errors
    ///
    /// Returns the original [`PublishError::Transport`] when delivery fails
    /// and no backend is usable, or [`PublishError::Store`] when the backend
    /// cannot store the event (unless the policy surfaces the transport
    /// error instead).
    pub fn publish_with_reliability(
        &self,
        request: &Request,
        selection: &BackendSelection,
        transport: &dyn Transport,
        warn_if_no_backend: bool,
    ) -> Result<PublishOutcome, PublishError> {
        let backend = self.resolve(selection);
        if backend.is_none() && warn_if_no_backend {
            warn!(url = %request.url, "Publishing without a reliability backend");
        }

        debug!(url = %request.url, state = ?DeliveryState::Pending, "Sending event");

        let failure = match transport
            .send(request)
            .and_then(|response| response.error_for_status(&request.url))
        {
            Ok(response) => {
                info!(
                    url = %request.url,
                    status = response.status_code,
                    state = ?DeliveryState::Sent,
                    "Event published"
                );
                return Ok(PublishOutcome::Sent(response));
            }
            Err(e) => e,
        };

        let Some(backend) = backend else {
            warn!(
                url = %request.url,
                error = %failure,
                state = ?DeliveryState::Failed,
                "Event delivery failed"
            );
            return Err(PublishError::Transport(failure));
        };

        let event = request.data.clone().unwrap_or_default();
        match backend.store(&event) {
            Ok(()) => {
                info!(
                    backend = backend.name(),
                    error = %failure,
                    state = ?DeliveryState::Deferred,
                    "Event delivery deferred"
                );
                Ok(PublishOutcome::Deferred {
                    backend: backend.name().to_string(),
                    error: failure,
                })
            }
            Err(store_error) => {
                error!(
                    backend = backend.name(),
                    error = %store_error,
                    delivery_error = %failure,
                    state = ?DeliveryState::Failed,
                    "Failed to store undeliverable event"
                );
                match self.store_failure_policy {
                    StoreFailurePolicy::Raise => Err(PublishError::Store {
                        backend: backend.name().to_string(),
                        source: store_error,
                        transport: failure,
                    }),
                    StoreFailurePolicy::SurfaceTransportError => {
                        Err(PublishError::Transport(failure))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryBackend;
    use serde_json::json;

    #[derive(Debug)]
    struct FixedTransport(Result<u16, TransportError>);

    impl Transport for FixedTransport {
        fn send(&self, _request: &Request) -> Result<Response, TransportError> {
            self.0
                .clone()
                .map(|status| Response::new(status, json!({"ok": status < 300})))
        }
    }

    #[derive(Debug)]
    struct BrokenBackend;

    impl ReliabilityBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        fn store(&self, _event: &Payload) -> Result<(), BackendError> {
            Err(BackendError::Backend("disk full".to_string()))
        }
    }

    fn request() -> Request {
        let data = cased_core::expect_object(json!({"user": "test"}), "data").unwrap();
        Request::post("https://publish.cased.com/").with_data(data)
    }

    fn connection_refused() -> TransportError {
        TransportError::Connection {
            url: "https://publish.cased.com/".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_success_skips_backend() {
        let engine = ReliabilityEngine::new();
        let backend = Arc::new(InMemoryBackend::new());
        engine.set_default_backend(BackendSelection::Backend(backend.clone())).unwrap();

        let outcome = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::Default,
                &FixedTransport(Ok(200)),
                false,
            )
            .unwrap();

        assert_eq!(outcome.state(), DeliveryState::Sent);
        assert_eq!(outcome.response().unwrap().status_code, 200);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_failure_defers_to_backend() {
        let engine = ReliabilityEngine::new();
        let backend = Arc::new(InMemoryBackend::new());
        engine.register_backend(backend.clone());

        let outcome = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::from("memory"),
                &FixedTransport(Err(connection_refused())),
                false,
            )
            .unwrap();

        assert!(outcome.is_deferred());
        assert_eq!(outcome.state(), DeliveryState::Deferred);
        assert_eq!(backend.events(), vec![request().data.unwrap()]);
    }

    #[test]
    fn test_non_success_status_counts_as_failure() {
        let engine = ReliabilityEngine::new();
        let backend = Arc::new(InMemoryBackend::new());

        let outcome = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::Backend(backend.clone()),
                &FixedTransport(Ok(503)),
                false,
            )
            .unwrap();

        match outcome {
            PublishOutcome::Deferred { backend: name, error } => {
                assert_eq!(name, "memory");
                assert_eq!(error.status(), Some(503));
            }
            other @ PublishOutcome::Sent(_) => panic!("expected deferral, got {other:?}"),
        }
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_failure_without_backend_surfaces_transport_error() {
        let engine = ReliabilityEngine::new();

        let err = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::Default,
                &FixedTransport(Err(connection_refused())),
                true,
            )
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport(e) if e == connection_refused()));
    }

    #[test]
    fn test_unknown_named_backend_falls_back_to_default() {
        let engine = ReliabilityEngine::new();
        let backend = Arc::new(InMemoryBackend::new());
        engine.set_default_backend(BackendSelection::Backend(backend.clone())).unwrap();

        let resolved = engine.resolve(&BackendSelection::from("nothere")).unwrap();
        assert_eq!(resolved.name(), "memory");
    }

    #[test]
    fn test_unknown_named_backend_without_default_sends_directly() {
        let engine = ReliabilityEngine::new();

        assert!(engine.resolve(&BackendSelection::from("nothere")).is_none());
        let outcome = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::from("nothere"),
                &FixedTransport(Ok(200)),
                false,
            )
            .unwrap();
        assert_eq!(outcome.state(), DeliveryState::Sent);
    }

    #[test]
    fn test_disabled_selection_ignores_default() {
        let engine = ReliabilityEngine::new();
        engine
            .set_default_backend(BackendSelection::Backend(Arc::new(InMemoryBackend::new())))
            .unwrap();

        assert!(engine.resolve(&BackendSelection::Disabled).is_none());
    }

    #[test]
    fn test_unregistered_default_is_rejected() {
        let engine = ReliabilityEngine::new();
        let err = engine
            .set_default_backend(BackendSelection::from("redis"))
            .unwrap_err();

        assert!(matches!(err, PublishError::ReliabilityConfig { .. }));
        assert!(engine.default_backend().is_none());
    }

    #[test]
    fn test_store_failure_raises_by_default() {
        let engine = ReliabilityEngine::new();
        let err = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::Backend(Arc::new(BrokenBackend)),
                &FixedTransport(Err(connection_refused())),
                false,
            )
            .unwrap_err();

        match err {
            PublishError::Store { backend, transport, .. } => {
                assert_eq!(backend, "broken");
                assert_eq!(transport, connection_refused());
            }
            other => panic!("expected store error, got {other:?}"),
        }
    }

    #[test]
    fn test_store_failure_can_surface_transport_error() {
        let engine =
            ReliabilityEngine::with_store_failure_policy(StoreFailurePolicy::SurfaceTransportError);
        let err = engine
            .publish_with_reliability(
                &request(),
                &BackendSelection::Backend(Arc::new(BrokenBackend)),
                &FixedTransport(Err(connection_refused())),
                false,
            )
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport(_)));
    }

    #[test]
    fn test_drain_unsupported_by_default() {
        let err = BrokenBackend.drain().unwrap_err();
        assert!(matches!(err, BackendError::Unsupported { operation: "drain", .. }));
    }

    #[test]
    fn test_selection_debug() {
        let selection = BackendSelection::Backend(Arc::new(InMemoryBackend::new()));
        assert_eq!(format!("{selection:?}"), "Backend(\"memory\")");
        assert_eq!(format!("{:?}", BackendSelection::from("file")), "Named(\"file\")");
    }
}
