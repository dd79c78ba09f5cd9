//! `stockroom-catalog` — product catalog domain types.
//!
//! Products are never deleted; retirement is `is_active = false`. The
//! `stock` field is a projection of the stock ledger and is only ever
//! written by the ledger commit path (or a rebuild).

pub mod product;

pub use product::Product;
