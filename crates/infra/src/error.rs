//! Infrastructure error model.

use thiserror::Error;

use stockroom_core::DomainError;

/// Result type used across the store/service layer.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer error.
///
/// Domain failures pass through unchanged so the HTTP layer can map them;
/// everything else (lost connections, poisoned locks, corrupt rows) is a
/// backend failure. A duplicate order-scoped movement is *not* an error at
/// this level: commits report it as `CommitOutcome::AlreadyRecorded`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure in {operation}: {message}")]
    Backend { operation: String, message: String },
}

impl StoreError {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// The domain error inside, if this is a domain failure.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            StoreError::Domain(err) => Some(err),
            StoreError::Backend { .. } => None,
        }
    }
}
