//! Event resource: fetch, list and publish audit events.

use cased_core::{expect_object, payload::kind_of, Payload, Query, Response, ValidationError};
use cased_publisher::{BackendSelection, PublishOutcome};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::client::CasedClient;
use crate::error::ClientError;

/// Default page size for event listing.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Parameters for listing events.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    /// Page size, sent as `per_page`.
    pub limit: u32,
    /// Search phrase, sent as `phrase`.
    pub search: Option<String>,
    /// Variable filters, sent as `variables[<key>]`. Must be a JSON object.
    pub variables: Option<Value>,
    /// Named policy key to list with.
    pub policy: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            variables: None,
            policy: None,
        }
    }
}

impl ListParams {
    /// Creates default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the search phrase.
    #[must_use]
    pub fn with_search(mut self, phrase: impl Into<String>) -> Self {
        self.search = Some(phrase.into());
        self
    }

    /// Sets the variable filters.
    #[must_use]
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Lists with a named policy key.
    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Builds the query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if `variables` is not an object.
    pub fn to_query(&self) -> Result<Payload, ClientError> {
        let mut query = Payload::new();
        query.insert("per_page".to_string(), Value::from(self.limit));

        if let Some(phrase) = &self.search {
            query.insert("phrase".to_string(), Value::String(phrase.clone()));
        }

        if let Some(variables) = &self.variables {
            let Value::Object(variables) = variables else {
                return Err(
                    ValidationError::expected_object("variables", kind_of(variables)).into(),
                );
            };
            for (key, value) in variables {
                query.insert(format!("variables[{key}]"), value.clone());
            }
        }

        Ok(query)
    }
}

/// One page of a list response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultsList {
    /// Records on this page.
    #[serde(default)]
    pub results: Vec<Value>,
    /// Total number of matching records.
    pub total_count: Option<u64>,
    /// Total number of pages.
    pub total_pages: Option<u64>,
    /// URL of the next page, if any.
    #[serde(rename = "next")]
    pub next_page_url: Option<String>,
}

impl ResultsList {
    /// Decodes a list response body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if the body is not a list response.
    pub fn from_response(response: Response) -> Result<Self, ClientError> {
        if response.body.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(response.body).map_err(|e| ClientError::Decode {
            reason: e.to_string(),
        })
    }

    /// Number of records on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true when this page has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns true when another page is available.
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.next_page_url.is_some()
    }
}

/// Operations on `/events`.
#[derive(Debug, Clone, Copy)]
pub struct Events<'a> {
    client: &'a CasedClient,
}

impl<'a> Events<'a> {
    pub(crate) const fn new(client: &'a CasedClient) -> Self {
        Self { client }
    }

    /// Fetches a single event by id.
    ///
    /// The id is sent as a single percent-encoded path segment.
    ///
    /// # Errors
    ///
    /// Returns an error if no policy key is available, the API base URL is
    /// invalid or the request fails.
    pub fn fetch(&self, id: &str, api_key: Option<&str>) -> Result<Response, ClientError> {
        let key = self.client.policy_key(api_key, None)?;

        let base = self.client.api_url("events/");
        let mut url = Url::parse(&base).map_err(|e| ClientError::Configuration {
            reason: format!("Invalid API base URL '{base}': {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Configuration {
                reason: format!("API base URL '{base}' cannot take a path"),
            })?
            .pop_if_empty()
            .push(id);

        self.client.get(url.into(), key, None)
    }

    /// Lists events.
    ///
    /// Parameters are validated before any request is made.
    ///
    /// # Errors
    ///
    /// Returns an error if `params.variables` is not an object, no policy key
    /// is available, the request fails or the response cannot be decoded.
    pub fn list(
        &self,
        params: &ListParams,
        api_key: Option<&str>,
    ) -> Result<ResultsList, ClientError> {
        let query = params.to_query()?;
        let key = self.client.policy_key(api_key, params.policy.as_deref())?;
        let url = self.client.api_url("events/");

        ResultsList::from_response(self.client.get(url, key, Some(query))?)
    }

    /// Lists events performed by `actor`.
    ///
    /// # Errors
    ///
    /// See [`Events::list`].
    pub fn list_by_actor(
        &self,
        actor: &str,
        params: ListParams,
        api_key: Option<&str>,
    ) -> Result<ResultsList, ClientError> {
        self.list(&params.with_search(Query::term("actor", actor)), api_key)
    }

    /// Lists events with the given action.
    ///
    /// # Errors
    ///
    /// See [`Events::list`].
    pub fn list_by_action(
        &self,
        action: &str,
        params: ListParams,
        api_key: Option<&str>,
    ) -> Result<ResultsList, ClientError> {
        self.list(&params.with_search(Query::term("action", action)), api_key)
    }

    /// Fetches the page after `page`, if there is one.
    ///
    /// # Errors
    ///
    /// See [`Events::list`].
    pub fn next_page(
        &self,
        page: &ResultsList,
        api_key: Option<&str>,
    ) -> Result<Option<ResultsList>, ClientError> {
        let Some(url) = &page.next_page_url else {
            return Ok(None);
        };
        let key = self.client.policy_key(api_key, None)?;
        ResultsList::from_response(self.client.get(url.clone(), key, None)?).map(Some)
    }

    /// Publishes an event with the default reliability backend.
    ///
    /// Returns `Ok(None)` when publishing is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Publish`] if publishing fails.
    pub fn publish(&self, data: Value) -> Result<Option<PublishOutcome>, ClientError> {
        Ok(self.client.publisher().publish(data)?)
    }

    /// Publishes an event with an explicit reliability backend selection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Publish`] if publishing fails.
    pub fn publish_with(
        &self,
        data: Value,
        backend: &BackendSelection,
    ) -> Result<Option<PublishOutcome>, ClientError> {
        Ok(self.client.publisher().publish_with(data, backend)?)
    }

    /// Builds a search phrase matching every `key:value` pair of `terms`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] if `terms` is not an object.
    pub fn phrase(terms: Value) -> Result<String, ClientError> {
        let terms = expect_object(terms, "terms")?;
        Ok(Query::make_phrase_from_map(&terms))
    }
}
