//! Search phrases for event listing.

use serde_json::Value;

use crate::payload::Payload;

/// Builds search phrases understood by the events listing endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query;

impl Query {
    /// Joins every `key:value` pair of `terms` with `AND`, in map order.
    ///
    /// # Examples
    ///
    /// ```
    /// use cased_core::Query;
    /// use serde_json::json;
    ///
    /// let terms = cased_core::expect_object(
    ///     json!({"actor": "test", "event": "user.login"}),
    ///     "terms",
    /// )?;
    /// assert_eq!(Query::make_phrase_from_map(&terms), "(actor:test AND event:user.login)");
    /// # Ok::<(), cased_core::ValidationError>(())
    /// ```
    #[must_use]
    pub fn make_phrase_from_map(terms: &Payload) -> String {
        let clauses: Vec<String> = terms
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}:{s}"),
                other => format!("{key}:{other}"),
            })
            .collect();
        format!("({})", clauses.join(" AND "))
    }

    /// Phrase matching a single `key:value` term.
    #[must_use]
    pub fn term(key: &str, value: &str) -> String {
        format!("({key}:{value})")
    }
}
