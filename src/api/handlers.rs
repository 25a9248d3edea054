use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::api::types::*;
use crate::engine::SearchEngine;
use crate::error::{ErrorKind, IndexError};
use crate::metrics::Operation;

use super::router::AppState;

/// `Retry-After` value sent with errors a client may retry
const RETRY_AFTER_SECS: &str = "1";

/// Error wrapper for API handlers
pub enum ApiError {
    Index(IndexError),
    /// The blocking task running the engine call panicked or was aborted
    Internal(String),
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        ApiError::Index(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidPayload | ErrorKind::QueryError => StatusCode::BAD_REQUEST,
        ErrorKind::StorageUnavailable | ErrorKind::StorageBusy | ErrorKind::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, retriable) = match self {
            ApiError::Index(e) => {
                let kind = e.kind();
                (status_for(kind), kind.as_str(), e.to_string(), e.is_retriable())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, false)
            }
        };

        let mut response = (status, Json(ErrorResponse::new(error_type, message))).into_response();
        if retriable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Run an engine call on the blocking pool.
///
/// The call's token is cancelled if the request future is dropped first.
async fn run_blocking<T, F>(state: &AppState, op: Operation, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SearchEngine, &CancellationToken) -> crate::Result<T> + Send + 'static,
{
    let engine = state.engine.clone();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let start = Instant::now();

    let joined = tokio::task::spawn_blocking(move || f(&*engine, &cancel)).await;
    guard.disarm();

    let result = match joined {
        Ok(result) => result.map_err(ApiError::Index),
        Err(e) => {
            error!(op = op.as_str(), "engine task failed: {}", e);
            Err(ApiError::Internal(format!("{} task failed", op.as_str())))
        }
    };

    let outcome = match &result {
        Ok(_) => None,
        Err(ApiError::Index(e)) => {
            if matches!(e.kind(), ErrorKind::StorageUnavailable | ErrorKind::StorageBusy) {
                warn!(op = op.as_str(), "{}", e);
            }
            Some(e.kind())
        }
        Err(ApiError::Internal(_)) => Some(ErrorKind::StorageUnavailable),
    };
    state
        .metrics
        .record(op, outcome, start.elapsed().as_secs_f64());
    result
}

/// Liveness check
pub async fn ping() -> impl IntoResponse {
    Json(PingResponse {
        message: "pong".to_string(),
    })
}

/// Index the raw JSON body, optionally under `?id=`
pub async fn index_document(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndexParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (id, stats) = run_blocking(&state, Operation::Index, move |engine, cancel| {
        let id = engine.index_document(&body, params.id, cancel)?;
        Ok((id, engine.stats()?))
    })
    .await?;
    state
        .metrics
        .set_index_stats(stats.documents, stats.archive_bytes);

    Ok((StatusCode::CREATED, Json(IndexResponse { id })))
}

/// Free-text match search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let request = params.into_request();
    let results = run_blocking(&state, Operation::Search, move |engine, cancel| {
        engine.run_query(&request, cancel)
    })
    .await?;

    Ok(Json(SearchResponse { results }))
}

/// Reconstructed fields of one document
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = run_blocking(&state, Operation::Fetch, move |engine, cancel| {
        engine.fetch_document(&doc_id, cancel)
    })
    .await?;

    Ok(Json(view))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let stats = tokio::task::spawn_blocking(move || engine.stats())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        documents: stats.documents,
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InvalidPayload), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::QueryError), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::StorageBusy), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_busy_errors_carry_retry_after() {
        let busy = ApiError::Index(IndexError::StorageBusy("locked".to_string())).into_response();
        assert_eq!(busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(busy.headers().get(header::RETRY_AFTER).unwrap(), "1");

        let unavailable =
            ApiError::Index(IndexError::StorageUnavailable("corrupt".to_string())).into_response();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(unavailable.headers().get(header::RETRY_AFTER).is_none());

        let missing = ApiError::Index(IndexError::NotFound("d1".to_string())).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(missing.headers().get(header::RETRY_AFTER).is_none());
    }
}
