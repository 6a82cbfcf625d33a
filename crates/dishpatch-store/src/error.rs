//! Store error types.
//!
//! These are the backing store's own failure kinds. The data access layer
//! hands them to callers unchanged.

use dishpatch_core::DishpatchError;
use thiserror::Error;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (pool closed, timed out, I/O failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The caller's role or identity does not satisfy the access rules.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The addressed document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The document is not in the state the write requires, or already exists.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The request itself is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A stored document could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying `SQLx` error that is not a connectivity problem.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Invariant violation inside the store.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connectivity failure; the caller may retry
    Unavailable,
    /// Caller lacks the role or ownership required
    PermissionDenied,
    /// Entity id absent
    NotFound,
    /// Entity is in a conflicting state
    Conflict,
    /// Malformed request
    InvalidArgument,
    /// Anything else
    Internal,
}

impl StoreError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::FailedPrecondition(_) => ErrorKind::Conflict,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Migration(_) | Self::Serialization(_) | Self::Database(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Shorthand for a missing `collection/id`.
    #[must_use]
    pub fn not_found(collection: impl std::fmt::Display, id: &str) -> Self {
        Self::NotFound(format!("{collection}/{id}"))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Self::Unavailable(err.to_string())
            }
            sqlx::Error::Io(e) => Self::Unavailable(format!("I/O error: {e}")),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::FailedPrecondition(format!("already exists: {}", db.message()))
            }
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            sqlx::Error::Database(ref db)
                if matches!(db.code().as_deref(), Some("5" | "6" | "261" | "517")) =>
            {
                Self::Unavailable(db.message().to_string())
            }
            other => Self::Database(other),
        }
    }
}

impl From<DishpatchError> for StoreError {
    fn from(err: DishpatchError) -> Self {
        match err {
            DishpatchError::Validation(msg) => Self::InvalidArgument(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
