//! Write-side services over the stores.
//!
//! Each service owns a cheap-to-clone store handle (an `Arc`-wrapped store in
//! practice) and exposes one coarse operation per business action. Everything
//! that must be atomic lives in the store's `commit_movement`; the services
//! sequence commits and collect per-item outcomes.

mod fulfillment;
mod status;
mod stock;

pub use fulfillment::{FulfillmentService, ItemOutcome, ItemStatus, ReconciliationResult};
pub use status::{OrderStatusService, StatusChange};
pub use stock::{AdjustStock, Adjustment, StockService};
