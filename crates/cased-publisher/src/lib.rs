//! Event publication pipeline for the Cased audit client.
//!
//! This crate turns caller event data into the payload sent to the Cased
//! publish endpoint:
//! - Data plugins contribute low-precedence default fields
//! - The context store contributes request-scoped fields
//! - Sensitive data handlers annotate or redact PII
//! - The reliability engine stores undeliverable events for later replay
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cased_core::{Request, Response, Transport, TransportError};
//! use cased_publisher::{InMemoryBackend, Publisher};
//! use serde_json::json;
//!
//! #[derive(Debug)]
//! struct Accept;
//!
//! impl Transport for Accept {
//!     fn send(&self, _request: &Request) -> Result<Response, TransportError> {
//!         Ok(Response::new(200, json!({})))
//!     }
//! }
//!
//! let publisher = Publisher::builder(Arc::new(Accept))
//!     .publish_key("cs_test_001")
//!     .with_backend(Arc::new(InMemoryBackend::new()))
//!     .build()
//!     .unwrap();
//!
//! publisher.context().update_value(json!({"location": "hq"})).unwrap();
//! let outcome = publisher.publish(json!({"action": "user.login"})).unwrap();
//! assert!(outcome.is_some());
//! ```

mod backends;
mod context;
mod error;
mod plugins;
mod publisher;
mod reliability;
mod sensitive;

pub use backends::{FileBackend, FileBackendConfig, InMemoryBackend};
pub use context::Context;
pub use error::{BackendError, HandlerError, PublishError};
pub use plugins::{CasedDefaultPlugin, DataPlugin, FieldsPlugin, PluginPipeline};
pub use publisher::{
    PublishSettings, Publisher, PublisherBuilder, CASED_ID_FIELD, TIMESTAMP_FIELD,
};
pub use reliability::{
    BackendSelection, DeliveryState, PublishOutcome, ReliabilityBackend, ReliabilityEngine,
    StoreFailurePolicy,
};
pub use sensitive::{
    annotate, FieldRedaction, PatternHandler, PiiRange, RedactionMode, SensitiveDataHandler,
    SensitiveDataPipeline, PII_ANNOTATION_KEY, REDACTED_PLACEHOLDER,
};
