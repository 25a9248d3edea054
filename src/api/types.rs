use serde::{Deserialize, Serialize};

use crate::models::{DocumentId, SearchRequest, SearchResults};

/// Query string of `POST /index`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexParams {
    #[serde(default)]
    pub id: Option<DocumentId>,
}

/// Response after indexing a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub id: DocumentId,
}

/// Query string of `GET /search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub from: Option<usize>,
}

impl SearchParams {
    pub fn into_request(self) -> SearchRequest {
        let mut request = SearchRequest::new(self.query);
        if let Some(size) = self.size {
            request = request.with_size(size);
        }
        if let Some(from) = self.from {
            request = request.with_from(from);
        }
        request
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: SearchResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: u64,
}

/// API Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_defaults() {
        let params: SearchParams = serde_json::from_str("{}").unwrap();
        let request = params.into_request();
        assert_eq!(request.query, "");
        assert_eq!(request.size, 10);
        assert_eq!(request.from, 0);
    }

    #[test]
    fn test_search_params_paging() {
        let params = SearchParams {
            query: "fox".to_string(),
            size: Some(3),
            from: Some(6),
        };
        let request = params.into_request();
        assert_eq!((request.size, request.from), (3, 6));
    }
}
