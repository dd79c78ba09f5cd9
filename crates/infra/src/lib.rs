//! Infrastructure layer: stores, services, notifications.
//!
//! The store traits in [`store`] are the persistence seam: an in-memory
//! implementation for dev/test and a Postgres implementation for production,
//! both upholding the same atomic-commit contract for ledger writes. The
//! services in [`service`] orchestrate domain rules against a store.

pub mod error;
pub mod notify;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use error::{StoreError, StoreResult};
