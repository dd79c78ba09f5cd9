//! Store traits: the persistence seam between services and storage.
//!
//! The central contract is [`LedgerStore::commit_movement`]: duplicate check,
//! ledger append and stock projection update happen as one atomic unit,
//! serialized per product. Everything the system guarantees about
//! exactly-once deduction rests on that method; the rest of the traits are
//! ordinary reads and writes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use stockroom_catalog::Product;
use stockroom_core::{OrderId, ProductId};
use stockroom_ledger::{MovementDraft, StockMovement};
use stockroom_orders::{Order, OrderItem, OrderStatus};

use crate::error::StoreResult;

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Result of an atomic ledger commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new movement was appended and the projection updated.
    Committed {
        movement: StockMovement,
        product: Product,
    },
    /// A movement for the same `(order, product, reason)` already existed.
    /// Nothing was written; the existing row and current product are
    /// returned so callers can treat the commit as settled.
    AlreadyRecorded {
        movement: StockMovement,
        product: Product,
    },
}

impl CommitOutcome {
    pub fn movement(&self) -> &StockMovement {
        match self {
            CommitOutcome::Committed { movement, .. } => movement,
            CommitOutcome::AlreadyRecorded { movement, .. } => movement,
        }
    }

    pub fn product(&self) -> &Product {
        match self {
            CommitOutcome::Committed { product, .. } => product,
            CommitOutcome::AlreadyRecorded { product, .. } => product,
        }
    }

    pub fn already_recorded(&self) -> bool {
        matches!(self, CommitOutcome::AlreadyRecorded { .. })
    }
}

/// Result of replaying a product's ledger into its projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockRebuild {
    pub product_id: ProductId,
    /// Projected stock before the rebuild.
    pub previous: i64,
    /// Stock after replaying the full movement history in order.
    pub replayed: i64,
}

/// One per-product line of the stock audit.
///
/// `projected` and `ledger_sum` legitimately differ after a clamped
/// over-deduction; `diverged` makes those incidents easy to filter for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockAudit {
    pub product_id: ProductId,
    /// Current `products.stock`.
    pub projected: i64,
    /// Raw sum of all movement deltas (no clamping).
    pub ledger_sum: i64,
    /// In-order clamped replay of the movement history.
    pub replayed: i64,
    pub diverged: bool,
}

/// Product catalog reads and writes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: Product) -> StoreResult<()>;

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// All products in creation order.
    async fn products(&self) -> StoreResult<Vec<Product>>;

    /// Active products whose name or SKU equals `key` case-insensitively.
    /// Zero or several results are both meaningful to the reconciler.
    async fn find_active_by_key(&self, key: &str) -> StoreResult<Vec<Product>>;

    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product>;
}

/// Order read model plus the status compare-and-swap.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order, items: Vec<OrderItem>) -> StoreResult<()>;

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>>;

    /// Set the status iff the order currently has `expected`.
    ///
    /// Fails with `DomainError::Conflict` when another writer got there
    /// first and `DomainError::NotFound` for an unknown order.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<Order>;
}

/// The append-only stock ledger and its projection.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically commit one movement: check for an order-scoped duplicate,
    /// append the row, and fold the delta into the product's stock (clamped
    /// at zero). Implementations must serialize commits per product.
    async fn commit_movement(&self, draft: MovementDraft) -> StoreResult<CommitOutcome>;

    /// A product's movements, newest first.
    async fn movements_by_product(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>>;

    /// An order's movements in ledger order (oldest first).
    async fn movements_by_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>>;

    /// The newest movements across all products.
    async fn recent_movements(&self, limit: usize) -> StoreResult<Vec<StockMovement>>;

    /// Replay a product's full history into the projection, overwriting it.
    async fn rebuild_stock(&self, product_id: ProductId) -> StoreResult<StockRebuild>;

    /// Projection-versus-ledger comparison for every product.
    async fn stock_audit(&self) -> StoreResult<Vec<StockAudit>>;
}

/// Everything the back office needs from storage, as one object.
pub trait BackOfficeStore: CatalogStore + OrderStore + LedgerStore {}

impl<S> BackOfficeStore for S where S: CatalogStore + OrderStore + LedgerStore {}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn insert_product(&self, product: Product) -> StoreResult<()> {
        (**self).insert_product(product).await
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        (**self).product(id).await
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        (**self).products().await
    }

    async fn find_active_by_key(&self, key: &str) -> StoreResult<Vec<Product>> {
        (**self).find_active_by_key(key).await
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product> {
        (**self).set_product_active(id, active).await
    }
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn insert_order(&self, order: Order, items: Vec<OrderItem>) -> StoreResult<()> {
        (**self).insert_order(order, items).await
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        (**self).order(id).await
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        (**self).order_items(id).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<Order> {
        (**self).update_order_status(id, expected, next).await
    }
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn commit_movement(&self, draft: MovementDraft) -> StoreResult<CommitOutcome> {
        (**self).commit_movement(draft).await
    }

    async fn movements_by_product(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>> {
        (**self).movements_by_product(product_id, limit).await
    }

    async fn movements_by_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        (**self).movements_by_order(order_id).await
    }

    async fn recent_movements(&self, limit: usize) -> StoreResult<Vec<StockMovement>> {
        (**self).recent_movements(limit).await
    }

    async fn rebuild_stock(&self, product_id: ProductId) -> StoreResult<StockRebuild> {
        (**self).rebuild_stock(product_id).await
    }

    async fn stock_audit(&self) -> StoreResult<Vec<StockAudit>> {
        (**self).stock_audit().await
    }
}
