//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// transitions, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, zero delta).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A line item or adjustment referenced a product that does not resolve
    /// to exactly one live catalog entry.
    #[error("product not found")]
    ProductNotFound,

    /// A name/SKU lookup matched more than one live product. The caller must
    /// not pick a winner; the detail names the candidates.
    #[error("ambiguous match: {0}")]
    AmbiguousMatch(String),

    /// A requested order status change is not a legal step in the lifecycle.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. lost a compare-and-swap race).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn product_not_found() -> Self {
        Self::ProductNotFound
    }

    pub fn ambiguous_match(msg: impl Into<String>) -> Self {
        Self::AmbiguousMatch(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
