//! `stockroom-ledger` — the append-only stock movement ledger.
//!
//! Every stock change in the system is one immutable [`StockMovement`].
//! Current stock is a projection: the in-order clamped fold of a product's
//! movements (see [`fold`]). Rows are inserted and read, never updated or
//! deleted.

pub mod fold;
pub mod movement;

pub use movement::{MovementDraft, MovementReason, StockMovement};
