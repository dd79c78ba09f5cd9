//! `stockroom-core` — identifiers and errors shared by every domain crate.
//!
//! Pure domain primitives only (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{MovementId, OrderId, ProductId};
