//! Context store.
//!
//! Default fields merged into every published event. Updates are additive
//! deep-merges; the whole store is cleared at once.

use cased_core::{deep_merge, expect_object, Payload, ValidationError};
use parking_lot::RwLock;
use serde_json::Value;

/// Shared, internally locked context mapping.
///
/// Every update holds the write lock for the whole merge, so concurrent
/// updates are serialised and none is lost.
#[derive(Debug, Default)]
pub struct Context {
    fields: RwLock<Payload>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-merges `partial` into the context.
    ///
    /// Incoming scalars replace existing ones, arrays concatenate and objects
    /// merge recursively.
    pub fn update(&self, partial: Payload) {
        let mut fields = self.fields.write();
        deep_merge(&mut fields, partial);
    }

    /// Deep-merges a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `partial` is not an object.
    pub fn update_value(&self, partial: Value) -> Result<(), ValidationError> {
        self.update(expect_object(partial, "context")?);
        Ok(())
    }

    /// Removes every field.
    pub fn clear(&self) {
        self.fields.write().clear();
    }

    /// Returns a copy of the current fields.
    #[must_use]
    pub fn snapshot(&self) -> Payload {
        self.fields.read().clone()
    }

    /// Returns a single field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.read().get(key).cloned()
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Returns true when the context holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }
}
