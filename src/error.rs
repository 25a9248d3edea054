use thiserror::Error;

/// Main error type for docsearch operations
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage busy: {0}")]
    StorageBusy(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for docsearch operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Stable error classification exposed to callers of the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    StorageUnavailable,
    StorageBusy,
    NotFound,
    InvalidPayload,
    QueryError,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::StorageBusy => "storage_busy",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::QueryError => "query_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            IndexError::StorageBusy(_) => ErrorKind::StorageBusy,
            IndexError::NotFound(_) => ErrorKind::NotFound,
            IndexError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            IndexError::QueryError(_) => ErrorKind::QueryError,
            IndexError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Wrap any storage-layer failure (fjall, bincode, io) as `StorageUnavailable`
    pub fn storage(err: impl std::fmt::Display) -> Self {
        IndexError::StorageUnavailable(err.to_string())
    }

    /// Check if this error indicates contention that a later attempt could clear
    pub fn is_retriable(&self) -> bool {
        matches!(self, IndexError::StorageBusy(_))
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::storage(e)
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::StorageUnavailable(format!("corrupt record: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::NotFound("d42".to_string());
        assert_eq!(err.to_string(), "Document not found: d42");
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            IndexError::StorageBusy("x".into()).kind().as_str(),
            "storage_busy"
        );
        assert_eq!(
            IndexError::InvalidPayload("x".into()).kind(),
            ErrorKind::InvalidPayload
        );
        assert_eq!(IndexError::Cancelled.kind().as_str(), "cancelled");
    }

    #[test]
    fn test_io_errors_become_storage_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: IndexError = io.into();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn test_retriable_errors() {
        assert!(IndexError::StorageBusy("locked".to_string()).is_retriable());
        assert!(!IndexError::StorageUnavailable("corrupt".to_string()).is_retriable());
        assert!(!IndexError::NotFound("d1".to_string()).is_retriable());
    }
}
