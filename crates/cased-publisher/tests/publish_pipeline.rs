//! End-to-end tests for the publish operation.

use std::sync::Arc;

use cased_core::{Method, Request, Response, Transport, TransportError};
use cased_publisher::{
    BackendError, BackendSelection, CasedDefaultPlugin, DataPlugin, FieldsPlugin,
    HandlerError, InMemoryBackend, PatternHandler, PublishError, PublishSettings, Publisher,
    RedactionMode, ReliabilityBackend, SensitiveDataHandler, StoreFailurePolicy, CASED_ID_FIELD,
    PII_ANNOTATION_KEY, REDACTED_PLACEHOLDER, TIMESTAMP_FIELD,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Transport recording every request and answering with a fixed result.
#[derive(Debug)]
struct RecordingTransport {
    requests: Mutex<Vec<Request>>,
    result: Result<Response, TransportError>,
}

impl RecordingTransport {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            result: Ok(Response::new(200, json!({}))),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            result: Err(TransportError::Connection {
                url: "https://publish.cased.com/".to_string(),
                reason: "connection refused".to_string(),
            }),
        })
    }

    fn status(code: u16) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            result: Ok(Response::new(code, json!({"error": "unavailable"}))),
        })
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    fn last_data(&self) -> serde_json::Map<String, Value> {
        self.requests
            .lock()
            .last()
            .and_then(|r| r.data.clone())
            .unwrap()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.lock().push(request.clone());
        self.result.clone()
    }
}

#[derive(Debug)]
struct BrokenBackend;

impl ReliabilityBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    fn store(&self, _event: &cased_core::Payload) -> Result<(), BackendError> {
        Err(BackendError::Backend("disk full".to_string()))
    }
}

#[derive(Debug)]
struct FailingHandler;

impl SensitiveDataHandler for FailingHandler {
    fn name(&self) -> &str {
        "failing"
    }

    fn handle(
        &self,
        _payload: cased_core::Payload,
        _mode: RedactionMode,
    ) -> Result<cased_core::Payload, HandlerError> {
        Err(HandlerError::new("scanner unavailable"))
    }
}

fn publisher(transport: &Arc<RecordingTransport>) -> Publisher {
    Publisher::builder(transport.clone())
        .publish_key("cs_test_001")
        .build()
        .unwrap()
}

#[test]
fn test_publish_posts_to_publish_endpoint() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);

    let outcome = publisher.publish(json!({"user": "test"})).unwrap().unwrap();
    assert_eq!(outcome.response().map(|r| r.status_code), Some(200));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].url, "https://publish.cased.com/");
    assert_eq!(requests[0].api_key.as_deref(), Some("cs_test_001"));
}

#[test]
fn test_publish_stamps_identity() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);

    publisher.publish(json!({"user": "test"})).unwrap();
    publisher.publish(json!({"user": "test"})).unwrap();

    let requests = transport.requests();
    let first = requests[0].data.as_ref().unwrap();
    let second = requests[1].data.as_ref().unwrap();

    assert_eq!(first["user"], "test");
    assert!(first[TIMESTAMP_FIELD].is_string());
    assert_ne!(first[CASED_ID_FIELD], second[CASED_ID_FIELD]);
    assert_eq!(
        first[CasedDefaultPlugin::LIBRARY_FIELD],
        Value::String(cased_core::library_name())
    );
}

#[test]
fn test_precedence_caller_over_context_over_plugins() {
    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .with_plugin(Arc::new(FieldsPlugin::new(
            "defaults",
            json!({"location": "plugin", "env": "plugin", "team": "plugin"})
                .as_object()
                .cloned()
                .unwrap(),
        )))
        .build()
        .unwrap();
    publisher
        .context()
        .update_value(json!({"location": "context", "env": "context"}))
        .unwrap();

    publisher.publish(json!({"location": "caller"})).unwrap();

    let data = transport.last_data();
    assert_eq!(data["location"], "caller");
    assert_eq!(data["env"], "context");
    assert_eq!(data["team"], "plugin");
}

#[test]
fn test_context_lists_and_maps_are_unioned() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);
    publisher
        .context()
        .update_value(json!({"users": ["a", "b"], "request": {"id": "r1"}}))
        .unwrap();

    publisher
        .publish(json!({"users": ["c"], "request": {"path": "/login"}}))
        .unwrap();

    let data = transport.last_data();
    assert_eq!(data["users"], json!(["a", "b", "c"]));
    assert_eq!(data["request"], json!({"id": "r1", "path": "/login"}));
}

#[test]
fn test_context_is_kept_by_default() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);
    publisher.context().update_value(json!({"location": "hq"})).unwrap();

    publisher.publish(json!({"user": "test"})).unwrap();

    assert_eq!(publisher.context().get("location"), Some(json!("hq")));
}

#[test]
fn test_clear_context_after_publishing() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);
    publisher.update_settings(|s| s.clear_context_after_publishing = true);
    publisher.context().update_value(json!({"location": "hq"})).unwrap();

    publisher.publish(json!({"user": "test"})).unwrap();
    assert_eq!(transport.last_data()["location"], "hq");
    assert!(publisher.context().is_empty());

    publisher.publish(json!({"user": "test"})).unwrap();
    assert!(transport.last_data().get("location").is_none());
}

#[test]
fn test_context_cleared_even_when_publish_fails() {
    let transport = RecordingTransport::failing();
    let publisher = publisher(&transport);
    publisher.update_settings(|s| s.clear_context_after_publishing = true);
    publisher.context().update_value(json!({"location": "hq"})).unwrap();

    assert!(publisher.publish(json!({"user": "test"})).is_err());
    assert!(publisher.context().is_empty());
}

#[test]
fn test_disabled_publishing_returns_none_without_sending() {
    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .settings(PublishSettings {
            disable_publishing: true,
            ..PublishSettings::default()
        })
        .build()
        .unwrap();

    assert_eq!(publisher.publish(json!({"user": "test"})).unwrap(), None);
    assert!(transport.requests().is_empty());
}

#[test]
fn test_non_object_data_is_rejected() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);

    let err = publisher.publish(json!(["not", "an", "object"])).unwrap_err();
    assert!(matches!(err, PublishError::Validation(_)));
    assert!(err.to_string().contains("data"));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_failed_delivery_is_stored_once() {
    let transport = RecordingTransport::failing();
    let backend = Arc::new(InMemoryBackend::new());
    let publisher = Publisher::builder(transport.clone())
        .with_backend(backend.clone())
        .default_backend(BackendSelection::from(InMemoryBackend::NAME))
        .build()
        .unwrap();

    let outcome = publisher.publish(json!({"user": "test"})).unwrap().unwrap();

    assert!(outcome.is_deferred());
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.events()[0], transport.last_data());
}

#[test]
fn test_error_status_is_a_failed_delivery() {
    let transport = RecordingTransport::status(503);
    let backend = Arc::new(InMemoryBackend::new());
    let publisher = publisher(&transport);

    let outcome = publisher
        .publish_with(
            json!({"user": "test"}),
            &BackendSelection::Backend(backend.clone()),
        )
        .unwrap()
        .unwrap();

    assert!(outcome.is_deferred());
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_successful_delivery_never_stores() {
    let transport = RecordingTransport::ok();
    let backend = Arc::new(InMemoryBackend::new());
    let publisher = Publisher::builder(transport.clone())
        .with_backend(backend.clone())
        .default_backend(BackendSelection::from(InMemoryBackend::NAME))
        .build()
        .unwrap();

    publisher.publish(json!({"user": "test"})).unwrap();
    assert!(backend.is_empty());
}

#[test]
fn test_failed_delivery_without_backend_surfaces_transport_error() {
    let transport = RecordingTransport::failing();
    let publisher = publisher(&transport);

    let err = publisher.publish(json!({"user": "test"})).unwrap_err();
    assert!(matches!(
        err,
        PublishError::Transport(TransportError::Connection { .. })
    ));
}

#[test]
fn test_unknown_backend_name_still_publishes() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);

    let outcome = publisher
        .publish_with(json!({"user": "test"}), &BackendSelection::from("nothere"))
        .unwrap();

    assert!(outcome.is_some());
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn test_unknown_backend_name_surfaces_transport_error_on_failure() {
    let transport = RecordingTransport::failing();
    let publisher = publisher(&transport);

    let err = publisher
        .publish_with(json!({"user": "test"}), &BackendSelection::from("nothere"))
        .unwrap_err();

    assert!(matches!(err, PublishError::Transport(_)));
}

#[test]
fn test_store_failure_policies() {
    let transport = RecordingTransport::failing();

    let raising = Publisher::builder(transport.clone())
        .with_backend(Arc::new(BrokenBackend))
        .default_backend(BackendSelection::from("broken"))
        .build()
        .unwrap();
    let err = raising.publish(json!({"user": "test"})).unwrap_err();
    assert!(matches!(err, PublishError::Store { .. }));

    let surfacing = Publisher::builder(transport.clone())
        .with_backend(Arc::new(BrokenBackend))
        .default_backend(BackendSelection::from("broken"))
        .store_failure_policy(StoreFailurePolicy::SurfaceTransportError)
        .build()
        .unwrap();
    let err = surfacing.publish(json!({"user": "test"})).unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)));
}

#[test]
fn test_disabled_backend_selection_skips_default() {
    let transport = RecordingTransport::failing();
    let backend = Arc::new(InMemoryBackend::new());
    let publisher = Publisher::builder(transport.clone())
        .with_backend(backend.clone())
        .default_backend(BackendSelection::from(InMemoryBackend::NAME))
        .build()
        .unwrap();

    let err = publisher
        .publish_with(json!({"user": "test"}), &BackendSelection::Disabled)
        .unwrap_err();

    assert!(matches!(err, PublishError::Transport(_)));
    assert!(backend.is_empty());
}

#[test]
fn test_sensitive_fields_annotated_by_default() {
    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .with_sensitive_field("phone")
        .build()
        .unwrap();

    publisher.publish(json!({"phone": "555-1234"})).unwrap();

    let data = transport.last_data();
    assert_eq!(data["phone"], "555-1234");
    assert_eq!(
        data[PII_ANNOTATION_KEY]["pii"]["phone"],
        json!([{"begin": 0, "end": 8, "label": "phone"}])
    );
}

#[test]
fn test_delete_pii_redacts_fields_and_patterns() {
    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .with_sensitive_field("phone")
        .with_handler(Arc::new(PatternHandler::email()))
        .settings(PublishSettings {
            delete_pii: true,
            ..PublishSettings::default()
        })
        .build()
        .unwrap();

    publisher
        .publish(json!({
            "phone": "555-1234",
            "note": "contact jill@example.com",
            "profile": {"phone": "555-9999"}
        }))
        .unwrap();

    let data = transport.last_data();
    assert_eq!(data["phone"], REDACTED_PLACEHOLDER);
    assert_eq!(data["profile"]["phone"], REDACTED_PLACEHOLDER);
    assert_eq!(data["note"], format!("contact {REDACTED_PLACEHOLDER}"));
    assert!(data.get(PII_ANNOTATION_KEY).is_none());
}

#[test]
fn test_context_values_are_redacted_too() {
    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .with_sensitive_field("email")
        .settings(PublishSettings {
            delete_pii: true,
            ..PublishSettings::default()
        })
        .build()
        .unwrap();
    publisher
        .context()
        .update_value(json!({"email": "jill@example.com"}))
        .unwrap();

    publisher.publish(json!({"action": "user.login"})).unwrap();

    assert_eq!(transport.last_data()["email"], REDACTED_PLACEHOLDER);
}

#[test]
fn test_handler_failure_aborts_before_sending() {
    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .with_handler(Arc::new(FailingHandler))
        .build()
        .unwrap();

    let err = publisher.publish(json!({"user": "test"})).unwrap_err();

    assert!(matches!(err, PublishError::Redaction { ref handler, .. } if handler == "failing"));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_removed_plugin_stops_contributing() {
    let transport = RecordingTransport::ok();
    let publisher = publisher(&transport);

    assert!(publisher.plugins().remove_plugin(CasedDefaultPlugin::NAME));
    publisher.publish(json!({"user": "test"})).unwrap();

    assert!(transport
        .last_data()
        .get(CasedDefaultPlugin::LIBRARY_FIELD)
        .is_none());
}

#[test]
fn test_plugin_sees_caller_event() {
    #[derive(Debug)]
    struct ActorDomain;

    impl DataPlugin for ActorDomain {
        fn name(&self) -> &str {
            "actor_domain"
        }

        fn additions(&self, event: &cased_core::Payload) -> cased_core::Payload {
            let mut out = cased_core::Payload::new();
            if let Some(actor) = event.get("actor").and_then(Value::as_str) {
                if let Some((_, domain)) = actor.split_once('@') {
                    out.insert("actor_domain".to_string(), json!(domain));
                }
            }
            out
        }
    }

    let transport = RecordingTransport::ok();
    let publisher = Publisher::builder(transport.clone())
        .with_plugin(Arc::new(ActorDomain))
        .build()
        .unwrap();

    publisher.publish(json!({"actor": "jill@example.com"})).unwrap();

    assert_eq!(transport.last_data()["actor_domain"], "example.com");
}

#[test]
fn test_concurrent_publishes_share_context() {
    let transport = RecordingTransport::ok();
    let publisher = Arc::new(publisher(&transport));
    publisher.context().update_value(json!({"location": "hq"})).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let publisher = Arc::clone(&publisher);
            std::thread::spawn(move || {
                for i in 0..25 {
                    publisher.publish(json!({"n": t * 100 + i})).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 100);
    assert!(requests
        .iter()
        .all(|r| r.data.as_ref().is_some_and(|d| d["location"] == "hq")));
}
