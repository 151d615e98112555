//! # Cased Core
//!
//! Shared building blocks for the Cased audit client.
//!
//! This crate provides the pieces every other crate in the workspace agrees on:
//!
//! - [`Payload`] and [`deep_merge`] - the event data model and the merge rule
//!   used for context, plugin defaults and PII annotations
//! - [`Transport`] - the capability used to talk to the Cased API
//! - [`ClientConfig`] - keys, endpoints and feature flags, loadable from the
//!   environment
//! - [`Query`] - search phrase building for event listing
//!
//! ## Example
//!
//! ```rust
//! use cased_core::{deep_merge, Payload};
//! use serde_json::json;
//!
//! let mut context = Payload::new();
//! context.insert("users".into(), json!(["a", "b"]));
//!
//! let mut event = Payload::new();
//! event.insert("users".into(), json!(["c"]));
//!
//! deep_merge(&mut context, event);
//! assert_eq!(context["users"], json!(["a", "b", "c"]));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod payload;
pub mod query;
pub mod transport;


pub use config::{ClientConfig, DEFAULT_API_BASE, DEFAULT_PUBLISH_BASE};
pub use error::{Error, Result, TransportError, ValidationError};
pub use payload::{deep_merge, expect_object, merge_values, Payload};
pub use query::Query;
pub use transport::{Method, Request, Response, Transport};

/// Version of the client library, reported in user agents and event defaults.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library identifier used in user agents and the default data plugin.
#[must_use]
pub fn library_name() -> String {
    format!("cased-rust/{VERSION}")
}
