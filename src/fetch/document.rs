//! Document store fetcher
//!
//! Retrieves one entity's denormalized projection over the search
//! cluster's HTTP API: the main document by a term query on its ID, plus
//! each special collection's documents from their own indices, attached to
//! the record under the registry's collection keys.

use crate::config::SearchConfig;
use crate::error::{CheckError, CheckResult};
use crate::registry::SchemaRegistry;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cap on auxiliary documents fetched per special collection
const SPECIAL_COLLECTION_LIMIT: usize = 100;

pub struct DocumentFetcher {
    client: reqwest::Client,
    config: SearchConfig,
    registry: Arc<SchemaRegistry>,
}

impl DocumentFetcher {
    pub fn new(config: SearchConfig, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            registry,
        }
    }

    /// Fetch the document record for one entity. `Ok(None)` when the main
    /// index has no hit. A failed special-index query degrades to an
    /// absent collection key with a warning.
    pub async fn fetch(&self, entity_id: i64) -> CheckResult<Option<Value>> {
        let root_identity = &self.registry.root().identity_field;
        let query = term_query(root_identity, Value::from(entity_id), None);
        let hits = self.search(&self.config.index, &query).await?;
        let Some(mut document) = hits.into_iter().next() else {
            warn!(entity_id, "entity not found in document store");
            return Ok(None);
        };

        for collection in self.registry.specials() {
            let correlation = match &collection.root_source_field {
                None => Value::from(entity_id),
                Some(field) => document.get(field).cloned().unwrap_or(Value::Null),
            };
            if correlation.is_null() {
                debug!(
                    entity_id,
                    index = %collection.document_index,
                    "no correlation value on root document, skipping collection"
                );
                continue;
            }
            let query = term_query(
                &collection.correlation_field,
                correlation,
                Some(SPECIAL_COLLECTION_LIMIT),
            );
            match self.search(&collection.document_index, &query).await {
                Ok(rows) if !rows.is_empty() => {
                    if let Some(object) = document.as_object_mut() {
                        object.insert(
                            collection.document_collection_key.clone(),
                            Value::Array(rows),
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // Partial fetch failure: the collection key stays
                    // absent and the check proceeds
                    warn!(
                        entity_id,
                        index = %collection.document_index,
                        error = %e,
                        "special index query failed, leaving collection absent"
                    );
                }
            }
        }

        Ok(Some(document))
    }

    /// Run one search request and return the hit sources
    async fn search(&self, index: &str, query: &Value) -> CheckResult<Vec<Value>> {
        let url = format!("{}/{}/_search", self.config.base_url, index);
        let mut request = self.client.post(&url).json(query);
        if let (Some(user), Some(password)) = (&self.config.username, &self.config.password) {
            request = request.basic_auth(user, Some(password));
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CheckError::SearchStatus { status, body });
        }

        let body: Value = response.json().await?;
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source").cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }
}

/// Build a term query on one field, optionally bounded in size
fn term_query(field: &str, value: Value, size: Option<usize>) -> Value {
    let mut term = Map::new();
    term.insert(field.to_string(), value);
    let mut query = json!({ "query": { "term": Value::Object(term) } });
    if let Some(size) = size {
        query["size"] = Value::from(size);
    }
    query
}
