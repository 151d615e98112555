//! Sensitive data pipeline.
//!
//! Events pass through two stages before they are stamped and sent:
//!
//! 1. Field-name redaction. Keys listed as sensitive fields are masked or
//!    removed at any depth when PII deletion is on. Otherwise their top-level
//!    string values are annotated as PII ranges.
//! 2. Handlers, in registration order. A failing handler aborts the publish.
//!
//! PII annotations live under the reserved `.cased` key:
//!
//! ```text
//! {".cased": {"pii": {"email": [{"begin": 0, "end": 16, "label": "email"}]}}}
//! ```

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use cased_core::{deep_merge, Payload};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{HandlerError, PublishError};

/// Replacement value for masked data.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Reserved key holding PII annotations.
pub const PII_ANNOTATION_KEY: &str = ".cased";

/// How handlers and field redaction treat sensitive data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactionMode {
    /// Record PII ranges and leave values intact.
    #[default]
    Annotate,
    /// Remove sensitive data from the event.
    Delete,
}

impl RedactionMode {
    /// Mode selected by the `delete_pii` flag.
    #[must_use]
    pub const fn from_delete_pii(delete_pii: bool) -> Self {
        if delete_pii {
            Self::Delete
        } else {
            Self::Annotate
        }
    }
}

/// What happens to a sensitive field when PII is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRedaction {
    /// Replace the value with [`REDACTED_PLACEHOLDER`].
    #[default]
    Mask,
    /// Drop the key entirely.
    Remove,
}

/// A sensitive range inside a string value, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiRange {
    /// Offset of the first sensitive character.
    pub begin: usize,
    /// Offset one past the last sensitive character.
    pub end: usize,
    /// Kind of data found.
    pub label: String,
}

/// Records `ranges` for `field` under the `.cased.pii` annotation.
///
/// Annotations are deep-merged, so ranges from several handlers accumulate.
pub fn annotate(payload: &mut Payload, field: &str, ranges: Vec<PiiRange>) {
    if ranges.is_empty() {
        return;
    }
    let annotation = json!({ PII_ANNOTATION_KEY: { "pii": { field: ranges } } });
    if let Value::Object(annotation) = annotation {
        deep_merge(payload, annotation);
    }
}

/// Redacts or annotates sensitive data in an event.
pub trait SensitiveDataHandler: Send + Sync + Debug {
    /// Handler name, reported in errors.
    fn name(&self) -> &str;

    /// Transforms the event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be processed. The publish is then
    /// aborted rather than risk sending unredacted data.
    fn handle(&self, payload: Payload, mode: RedactionMode) -> Result<Payload, HandlerError>;
}

/// Handler matching a regular expression against top-level string values.
#[derive(Debug, Clone)]
pub struct PatternHandler {
    label: String,
    pattern: Regex,
}

impl PatternHandler {
    /// Creates a handler labelling matches of `pattern` as `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(label: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Handler for e-mail addresses.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn email() -> Self {
        Self::new("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
            .expect("email pattern is valid")
    }

    /// Handler for IPv4 addresses.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn ipv4() -> Self {
        Self::new("ip_address", r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 pattern is valid")
    }

    /// Label attached to matches.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn ranges(&self, value: &str) -> Vec<PiiRange> {
        self.pattern
            .find_iter(value)
            .map(|m| {
                let begin = value[..m.start()].chars().count();
                PiiRange {
                    begin,
                    end: begin + m.as_str().chars().count(),
                    label: self.label.clone(),
                }
            })
            .collect()
    }
}

impl SensitiveDataHandler for PatternHandler {
    fn name(&self) -> &str {
        &self.label
    }

    fn handle(&self, mut payload: Payload, mode: RedactionMode) -> Result<Payload, HandlerError> {
        let mut found = Vec::new();

        for (key, value) in &mut payload {
            if key == PII_ANNOTATION_KEY {
                continue;
            }
            let Value::String(text) = value else {
                continue;
            };
            match mode {
                RedactionMode::Annotate => {
                    let ranges = self.ranges(text);
                    if !ranges.is_empty() {
                        found.push((key.clone(), ranges));
                    }
                }
                RedactionMode::Delete => {
                    if self.pattern.is_match(text) {
                        *text = self.pattern.replace_all(text, REDACTED_PLACEHOLDER).into_owned();
                    }
                }
            }
        }

        for (key, ranges) in found {
            annotate(&mut payload, &key, ranges);
        }

        Ok(payload)
    }
}

/// Ordered sensitive data handlers plus the sensitive field set.
#[derive(Debug, Default)]
pub struct SensitiveDataPipeline {
    handlers: RwLock<Vec<Arc<dyn SensitiveDataHandler>>>,
    fields: RwLock<BTreeSet<String>>,
    field_redaction: FieldRedaction,
}

impl SensitiveDataPipeline {
    /// Creates an empty pipeline that masks sensitive fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty pipeline with the given field redaction policy.
    #[must_use]
    pub fn with_field_redaction(field_redaction: FieldRedaction) -> Self {
        Self {
            field_redaction,
            ..Self::default()
        }
    }

    /// Field redaction policy.
    #[must_use]
    pub const fn field_redaction(&self) -> FieldRedaction {
        self.field_redaction
    }

    /// Appends a handler.
    pub fn add_handler(&self, handler: Arc<dyn SensitiveDataHandler>) {
        self.handlers.write().push(handler);
    }

    /// Removes every handler.
    pub fn clear_handlers(&self) {
        self.handlers.write().clear();
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Marks a field name as sensitive.
    pub fn add_sensitive_field(&self, field: impl Into<String>) {
        self.fields.write().insert(field.into());
    }

    /// Unmarks a field name. Returns whether it was marked.
    pub fn remove_sensitive_field(&self, field: &str) -> bool {
        self.fields.write().remove(field)
    }

    /// Unmarks every field.
    pub fn clear_sensitive_fields(&self) {
        self.fields.write().clear();
    }

    /// Sensitive field names, sorted.
    #[must_use]
    pub fn sensitive_fields(&self) -> Vec<String> {
        self.fields.read().iter().cloned().collect()
    }

    /// Runs field redaction and then every handler.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Redaction`] if any handler fails.
    pub fn apply(
        &self,
        mut payload: Payload,
        mode: RedactionMode,
    ) -> Result<Payload, PublishError> {
        let fields = self.fields.read().clone();
        if !fields.is_empty() {
            match mode {
                RedactionMode::Delete => {
                    redact_fields(&mut payload, &fields, self.field_redaction);
                }
                RedactionMode::Annotate => annotate_fields(&mut payload, &fields),
            }
        }

        let handlers = self.handlers.read().clone();
        for handler in handlers {
            payload = handler
                .handle(payload, mode)
                .map_err(|e| PublishError::Redaction {
                    handler: handler.name().to_string(),
                    reason: e.message,
                })?;
            debug!(handler = handler.name(), ?mode, "Applied sensitive data handler");
        }

        Ok(payload)
    }
}

fn redact_fields(payload: &mut Payload, fields: &BTreeSet<String>, policy: FieldRedaction) {
    match policy {
        FieldRedaction::Remove => payload.retain(|key, _| !fields.contains(key)),
        FieldRedaction::Mask => {
            for (key, value) in payload.iter_mut() {
                if fields.contains(key) {
                    *value = Value::String(REDACTED_PLACEHOLDER.to_string());
                }
            }
        }
    }

    for (key, value) in payload.iter_mut() {
        if key != PII_ANNOTATION_KEY {
            redact_nested(value, fields, policy);
        }
    }
}

fn redact_nested(value: &mut Value, fields: &BTreeSet<String>, policy: FieldRedaction) {
    match value {
        Value::Object(map) => redact_fields(map, fields, policy),
        Value::Array(items) => {
            for item in items {
                redact_nested(item, fields, policy);
            }
        }
        _ => {}
    }
}

fn annotate_fields(payload: &mut Payload, fields: &BTreeSet<String>) {
    let found: Vec<(String, usize)> = payload
        .iter()
        .filter(|(key, _)| fields.contains(*key))
        .filter_map(|(key, value)| value.as_str().map(|s| (key.clone(), s.chars().count())))
        .collect();

    for (key, len) in found {
        let range = PiiRange {
            begin: 0,
            end: len,
            label: key.clone(),
        };
        annotate(payload, &key, vec![range]);
    }
}
