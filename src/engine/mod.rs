//! Document indexing, match queries and retrieval over one [`IndexStore`]

pub mod query;
pub mod retrieval;

use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::flatten;
use crate::config::IndexSettings;
use crate::error::{IndexError, Result};
use crate::index::{IndexStats, IndexStore};
use crate::models::{DocumentId, DocumentView, SearchHit, SearchRequest, SearchResults};

pub use query::QueryEngine;
pub use retrieval::get_document;

/// Payload key that may carry the document id
pub const ID_KEY: &str = "_id";

/// Internal key holding the raw bytes of the most recently indexed payload
pub const LAST_PAYLOAD_KEY: &[u8] = b"last_payload";

pub struct SearchEngine {
    store: IndexStore,
}

impl SearchEngine {
    pub fn open(settings: IndexSettings) -> Result<Self> {
        Ok(Self {
            store: IndexStore::open(settings)?,
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Parse, flatten and index a JSON object payload.
    ///
    /// The id is `id` when given, else the payload's string `_id` member,
    /// else a fresh UUID. A payload `_id` is not indexed as a field.
    pub fn index_document(
        &self,
        raw: &[u8],
        id: Option<DocumentId>,
        cancel: &CancellationToken,
    ) -> Result<DocumentId> {
        let payload: Value = serde_json::from_slice(raw)
            .map_err(|e| IndexError::InvalidPayload(format!("malformed JSON: {}", e)))?;
        let Value::Object(mut object) = payload else {
            return Err(IndexError::InvalidPayload(
                "document must be a JSON object".to_string(),
            ));
        };

        let embedded = match object.shift_remove(ID_KEY) {
            None => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                return Err(IndexError::InvalidPayload(format!(
                    "{} must be a string",
                    ID_KEY
                )))
            }
        };
        let doc_id = id
            .or(embedded)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if doc_id.is_empty() {
            return Err(IndexError::InvalidPayload(
                "document id must not be empty".to_string(),
            ));
        }

        let fields = flatten(&object);
        self.store.add(&doc_id, &fields, cancel)?;
        // Best effort, the document is already committed
        if let Err(e) = self.store.set_internal(LAST_PAYLOAD_KEY, raw) {
            warn!(doc_id = %doc_id, error = %e, "failed to record last payload");
        }

        info!(doc_id = %doc_id, fields = fields.len(), "document indexed");
        Ok(doc_id)
    }

    /// Run a match query and project every stored field of the requested page.
    pub fn run_query(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResults> {
        let start = Instant::now();
        let policy = self.store.settings().reconstruct_policy;
        let engine = QueryEngine::new(&self.store);

        // One guard for ranking and projection, so hits match their scores
        let reader = self.store.reader();
        let ranked = engine.evaluate(&reader, &request.query, cancel)?;
        let total_hits = ranked.len() as u64;
        let max_score = ranked.first().map(|r| r.score).unwrap_or(0.0);

        let mut hits = Vec::with_capacity(request.size.min(ranked.len()));
        for scored in ranked.into_iter().skip(request.from).take(request.size) {
            let view = get_document(&reader, &scored.doc_id, policy, cancel)?;
            hits.push(SearchHit {
                id: scored.doc_id,
                score: scored.score,
                fields: view.fields,
            });
        }
        drop(reader);

        let took_ms = start.elapsed().as_millis() as u64;
        debug!(
            query = %request.query,
            total_hits,
            returned = hits.len(),
            took_ms,
            "query evaluated"
        );
        Ok(SearchResults {
            query: request.query.clone(),
            hits,
            total_hits,
            max_score,
            took_ms,
        })
    }

    pub fn fetch_document(&self, doc_id: &str, cancel: &CancellationToken) -> Result<DocumentView> {
        let reader = self.store.reader();
        get_document(&reader, doc_id, self.store.settings().reconstruct_policy, cancel)
    }

    pub fn last_payload(&self) -> Result<Option<Vec<u8>>> {
        self.store.get_internal(LAST_PAYLOAD_KEY)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}
