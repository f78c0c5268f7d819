//! Error types for offstore.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// The taxonomy separates four categories that callers treat differently:
/// backend rejections (the server answered with a non-2xx status),
/// connectivity failures (the server could not be reached at all),
/// cache failures, and programmer-visible validation errors. Only the
/// connectivity category triggers the AUTO-mode cache fallback.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote call completed with a non-2xx HTTP status.
    ///
    /// All backend rejections share this kind; callers differentiate by
    /// the `status` field (400, 401, 403, 404, 409, 500, ...).
    #[error("backend error ({status}): {message}")]
    Backend {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Backend-supplied error message.
        message: String,
    },

    /// The remote call could not complete (host unreachable, timeout).
    #[error("network unreachable: {message}")]
    Network {
        /// Description of the connectivity failure.
        message: String,
    },

    /// No matching entity in the local cache.
    #[error("entity {id} not found in cache for collection {collection}")]
    CacheNotFound {
        /// Collection that was searched.
        collection: String,
        /// Entity ID that was not found.
        id: String,
    },

    /// The backend reported no matching entity (HTTP 404).
    #[error("entity {id} not found on backend for collection {collection}")]
    BackendNotFound {
        /// Collection that was searched.
        collection: String,
        /// Entity ID that was not found.
        id: String,
    },

    /// Local cache store failure other than a missing entity.
    #[error("cache error: {message}")]
    Cache {
        /// Description of the failure.
        message: String,
    },

    /// A required query was not supplied.
    #[error("query must not be null")]
    MissingQuery,

    /// A delete query carried only shaping operators and no filtering
    /// predicate. Unscoped deletes are disallowed by design.
    #[error("delete query has no where clause")]
    MissingWhereClause,

    /// The query predicate cannot be expressed in the backend query
    /// language and will not silently degrade to a full scan.
    #[error("where clause not supported: {reason}")]
    UnsupportedWhereClause {
        /// Why the predicate cannot be translated.
        reason: String,
    },

    /// A batch operation was invoked with an empty entity list.
    #[error("batch save requires a non-empty entity array")]
    EmptyBatch,

    /// The backend API version does not support the requested feature.
    #[error("not compatible version: requires API version {required}, backend is {actual}")]
    IncompatibleApiVersion {
        /// Minimum API version the feature needs.
        required: u32,
        /// API version the backend actually speaks.
        actual: u32,
    },

    /// Pull was invoked while the pending-write queue is non-empty.
    #[error("pull requires a clean sync queue ({count} pending writes)")]
    PendingWrites {
        /// Number of pending writes still queued.
        count: u64,
    },

    /// Entity serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates a backend error.
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Creates a network/connectivity error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Creates a cache not-found error.
    pub fn cache_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::CacheNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a backend not-found error.
    pub fn backend_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::BackendNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an unsupported where-clause error.
    pub fn unsupported_where(reason: impl Into<String>) -> Self {
        Self::UnsupportedWhereClause {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a connectivity failure.
    ///
    /// Only this category is eligible for the AUTO-mode cache fallback;
    /// backend and validation errors propagate without fallback.
    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::Network { .. })
    }

    /// Returns true if this is a not-found error from either store.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::CacheNotFound { .. } | StoreError::BackendNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_category() {
        assert!(StoreError::network("connection refused").is_network());
        assert!(!StoreError::backend(500, "boom").is_network());
        assert!(!StoreError::MissingQuery.is_network());
        assert!(!StoreError::PendingWrites { count: 3 }.is_network());
    }

    #[test]
    fn not_found_kinds_are_distinct() {
        let cache = StoreError::cache_not_found("todos", "t1");
        let backend = StoreError::backend_not_found("todos", "t1");

        assert!(cache.is_not_found());
        assert!(backend.is_not_found());
        assert!(matches!(cache, StoreError::CacheNotFound { .. }));
        assert!(matches!(backend, StoreError::BackendNotFound { .. }));
    }

    #[test]
    fn error_display() {
        let err = StoreError::IncompatibleApiVersion {
            required: 5,
            actual: 3,
        };
        assert!(err.to_string().contains("5"));
        assert!(err.to_string().contains("3"));

        let err = StoreError::PendingWrites { count: 2 };
        assert!(err.to_string().contains("2 pending"));
    }
}
