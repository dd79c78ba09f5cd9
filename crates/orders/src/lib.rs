//! `stockroom-orders` — order lifecycle domain types.
//!
//! Only the stock-affecting slice of an order's life is modeled here: its
//! status chain and line items. Pricing, payment capture and checkout live
//! upstream. The transition rules in [`status`] are pure; side effects
//! (deducting and restoring stock) are planned here and executed by the
//! services layer against the ledger.

pub mod order;
pub mod status;

pub use order::{FulfillmentType, Order, OrderItem};
pub use status::{plan_transition, OrderStatus, StockEffect, TransitionPlan};
