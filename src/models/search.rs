use serde::{Deserialize, Serialize};

use super::document::DocumentId;

/// A document id with its relevance score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_id: DocumentId,
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(doc_id: impl Into<DocumentId>, score: f32) -> Self {
        Self {
            doc_id: doc_id.into(),
            score,
        }
    }
}

/// Free-text match request with paging
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub from: usize,
}

fn default_size() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            size: default_size(),
            from: 0,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }
}

/// One ranked hit with every stored field projected
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub score: f32,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Search response with timing information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub total_hits: u64,
    pub max_score: f32,
    pub took_ms: u64,
}
