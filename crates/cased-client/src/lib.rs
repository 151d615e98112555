//! # Cased Client
//!
//! HTTP transport and API resources for the Cased audit service.
//!
//! This crate connects the publication pipeline from `cased-publisher` to the
//! real API and adds the read side of the service.
//!
//! ## Features
//!
//! - **HTTP transport**: blocking reqwest client with bearer authentication
//! - **Events resource**: fetch, list with variable filters and search
//!   phrases, pagination, publish
//! - **Key resolution**: explicit key, named policy key or default policy key
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cased_client::{CasedClient, ListParams};
//! use serde_json::json;
//!
//! let client = CasedClient::from_env()?;
//!
//! client.events().publish(json!({
//!     "action": "user.login",
//!     "actor": "jill@example.com",
//! }))?;
//!
//! let page = client
//!     .events()
//!     .list_by_actor("jill@example.com", ListParams::new().with_limit(10), None)?;
//! println!("{} events", page.len());
//! # Ok::<(), cased_client::ClientError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CasedClient                            │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Events    │  │  Publisher  │  │    HttpTransport    │  │
//! │  │  (reads)    │  │  (writes)   │  │    (reqwest)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//!        api.cased.com (reads)      publish.cased.com (writes)
//! ```

mod client;
mod error;
mod events;
mod transport;

pub use client::CasedClient;
pub use error::ClientError;
pub use events::{Events, ListParams, ResultsList, DEFAULT_PAGE_SIZE};
pub use transport::HttpTransport;
