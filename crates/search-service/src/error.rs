use std::fmt;

use search_index::IndexError;

/// Unified error type for the search service.
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// The index worker could not be started or is not accepting requests.
    WorkerUnavailable(String),
    /// No answer arrived before the deadline.
    Timeout(&'static str),
    /// The request was dropped before an answer arrived.
    Dropped(&'static str),
    /// The index worker answered with an error.
    Rejected(String),
    /// The persistent store failed.
    Storage(String),
    /// An external data source failed.
    Source(String),
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// Internal error.
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::WorkerUnavailable(msg) => write!(f, "index worker unavailable: {msg}"),
            ServiceError::Timeout(operation) => write!(f, "{operation} timed out"),
            ServiceError::Dropped(operation) => write!(f, "{operation} was dropped"),
            ServiceError::Rejected(msg) => write!(f, "rejected by index worker: {msg}"),
            ServiceError::Storage(msg) => write!(f, "storage error: {msg}"),
            ServiceError::Source(msg) => write!(f, "source error: {msg}"),
            ServiceError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            ServiceError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<IndexError> for ServiceError {
    fn from(error: IndexError) -> Self {
        match error {
            IndexError::Serialization(msg) => ServiceError::Storage(msg),
            other => ServiceError::Rejected(other.to_string()),
        }
    }
}

/// Result type alias using [`ServiceError`].
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_errors_map_to_service_errors() {
        assert!(matches!(
            ServiceError::from(IndexError::Serialization("bad json".to_string())),
            ServiceError::Storage(msg) if msg == "bad json"
        ));
        assert!(matches!(
            ServiceError::from(IndexError::NotReady("catalog")),
            ServiceError::Rejected(msg) if msg == "catalog index has not been built"
        ));
        assert!(matches!(
            ServiceError::from(IndexError::VersionMismatch {
                found: 999,
                expected: 1,
            }),
            ServiceError::Rejected(_)
        ));
    }
}
