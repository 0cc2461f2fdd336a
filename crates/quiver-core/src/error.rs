//! Error types for quiver operations.
//!
//! Three taxonomies with very different blast radii: `StoreError` and
//! `ClassificationError` are fatal to the calling operation and propagate,
//! while `ServeFailure` is always recoverable - the serving engine logs the
//! reason and schedules a retry.

use thiserror::Error;

/// Result type alias for quiver operations.
pub type AdsResult<T> = Result<T, AdsError>;

/// Main error type for all quiver operations.
#[derive(Error, Debug)]
pub enum AdsError {
    /// Catalog store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Page or intent classification failed.
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// A serving attempt could not produce an ad.
    #[error(transparent)]
    Serve(#[from] ServeFailure),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Catalog store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The on-disk schema is newer than this build understands. The caller
    /// should wipe the store and redownload the catalog.
    #[error(
        "Schema incompatible: on-disk compatible version {on_disk} exceeds \
         supported version {supported}"
    )]
    SchemaIncompatible { on_disk: i64, supported: i64 },

    /// A write violated a schema constraint.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Classification errors.
#[derive(Error, Debug)]
pub enum ClassificationError {
    /// The page carried no classifiable content.
    #[error("No content to classify for {url}")]
    NoContent { url: String },

    /// The profile locale has no classification support.
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),
}

/// Reasons a serving attempt produced no ad. Never fatal: the engine logs
/// the reason and retries on its failure interval.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServeFailure {
    #[error("Not initialized")]
    NotInitialized,

    #[error("Catalog not ready")]
    CatalogNotReady,

    #[error("Not allowed based on history: {0}")]
    PermissionDenied(String),

    #[error("No eligible ads found")]
    NoEligibleCandidates,

    #[error("Network connection not available")]
    NetworkUnavailable,

    #[error("Catalog older than one day")]
    CatalogStale,

    #[error("Notifications not allowed")]
    NotificationsNotAllowed,

    #[error("Not in foreground")]
    NotInForeground,
}

impl StoreError {
    /// Create a database error from a message.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(err.to_string())
            }
            _ => Self::Database {
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

impl From<rusqlite::Error> for AdsError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_incompatible_message() {
        let err = StoreError::SchemaIncompatible {
            on_disk: 7,
            supported: 5,
        };
        assert!(err.to_string().contains("7"));
        assert!(err.to_string().contains("5"));
    }

    #[test]
    fn test_serve_failure_is_recoverable_value() {
        // ServeFailure must be cheap to clone and compare so the engine can
        // stash it alongside retry state.
        let failure = ServeFailure::PermissionDenied("ads per hour".to_string());
        assert_eq!(failure.clone(), failure);
    }

    #[test]
    fn test_store_error_wraps_into_ads_error() {
        let err: AdsError = StoreError::database("disk gone").into();
        assert!(err.to_string().contains("disk gone"));
    }
}
