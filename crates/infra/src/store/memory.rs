use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use stockroom_catalog::Product;
use stockroom_core::{DomainError, OrderId, ProductId};
use stockroom_ledger::{fold, MovementDraft, MovementReason, StockMovement};
use stockroom_orders::{Order, OrderItem, OrderStatus};

use super::{CatalogStore, CommitOutcome, LedgerStore, OrderStore, StockAudit, StockRebuild};
use crate::error::{StoreError, StoreResult};

type DedupKey = (OrderId, ProductId, MovementReason);

/// In-memory store for dev/test.
///
/// Each product sits behind its own mutex, so the commit critical section
/// (duplicate check, append, projection fold) serializes writers per product
/// without stalling commits against other products. Lock order everywhere:
/// product map, then one product slot, then movements/dedup.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    products: RwLock<HashMap<ProductId, Arc<Mutex<Product>>>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    order_items: RwLock<HashMap<OrderId, Vec<OrderItem>>>,
    /// The ledger, in append order.
    movements: RwLock<Vec<StockMovement>>,
    dedup: RwLock<HashMap<DedupKey, StockMovement>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(operation: &str) -> StoreError {
        StoreError::backend(operation, "lock poisoned")
    }

    fn product_slot(&self, id: ProductId, operation: &str) -> StoreResult<Arc<Mutex<Product>>> {
        let products = self
            .products
            .read()
            .map_err(|_| Self::poisoned(operation))?;
        products
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::product_not_found().into())
    }

    fn product_deltas(&self, id: ProductId, operation: &str) -> StoreResult<Vec<i64>> {
        let movements = self
            .movements
            .read()
            .map_err(|_| Self::poisoned(operation))?;
        Ok(movements
            .iter()
            .filter(|m| m.product_id == id)
            .map(|m| m.delta)
            .collect())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_product(&self, product: Product) -> StoreResult<()> {
        let mut products = self
            .products
            .write()
            .map_err(|_| Self::poisoned("insert_product"))?;
        if products.contains_key(&product.id) {
            return Err(DomainError::conflict(format!(
                "product {} already exists",
                product.id
            ))
            .into());
        }
        products.insert(product.id, Arc::new(Mutex::new(product)));
        Ok(())
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let slot = {
            let products = self.products.read().map_err(|_| Self::poisoned("product"))?;
            products.get(&id).cloned()
        };
        match slot {
            Some(slot) => {
                let product = slot.lock().map_err(|_| Self::poisoned("product"))?;
                Ok(Some(product.clone()))
            }
            None => Ok(None),
        }
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        let slots: Vec<Arc<Mutex<Product>>> = {
            let products = self.products.read().map_err(|_| Self::poisoned("products"))?;
            products.values().cloned().collect()
        };
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            let product = slot.lock().map_err(|_| Self::poisoned("products"))?;
            out.push(product.clone());
        }
        // UUIDv7 ids sort in creation order.
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    async fn find_active_by_key(&self, key: &str) -> StoreResult<Vec<Product>> {
        let mut matches: Vec<Product> = self
            .products()
            .await?
            .into_iter()
            .filter(|p| p.is_active && p.matches_key(key))
            .collect();
        matches.sort_by_key(|p| p.id);
        Ok(matches)
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product> {
        let slot = self.product_slot(id, "set_product_active")?;
        let mut product = slot
            .lock()
            .map_err(|_| Self::poisoned("set_product_active"))?;
        product.set_active(active);
        Ok(product.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order, items: Vec<OrderItem>) -> StoreResult<()> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| Self::poisoned("insert_order"))?;
        if orders.contains_key(&order.id) {
            return Err(DomainError::conflict(format!("order {} already exists", order.id)).into());
        }
        let mut order_items = self
            .order_items
            .write()
            .map_err(|_| Self::poisoned("insert_order"))?;
        order_items.insert(order.id, items);
        orders.insert(order.id, order);
        Ok(())
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let orders = self.orders.read().map_err(|_| Self::poisoned("order"))?;
        Ok(orders.get(&id).cloned())
    }

    async fn order_items(&self, id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let order_items = self
            .order_items
            .read()
            .map_err(|_| Self::poisoned("order_items"))?;
        let mut items = order_items.get(&id).cloned().unwrap_or_default();
        items.sort_by_key(|i| i.line_no);
        Ok(items)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<Order> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| Self::poisoned("update_order_status"))?;
        let order = orders
            .get_mut(&id)
            .ok_or(StoreError::Domain(DomainError::NotFound))?;
        if order.status != expected {
            return Err(DomainError::conflict(format!(
                "order status is {}, expected {}",
                order.status, expected
            ))
            .into());
        }
        order.set_status(next);
        Ok(order.clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn commit_movement(&self, draft: MovementDraft) -> StoreResult<CommitOutcome> {
        draft.validate()?;

        let slot = self.product_slot(draft.product_id, "commit_movement")?;

        // Per-product critical section.
        let mut product = slot
            .lock()
            .map_err(|_| Self::poisoned("commit_movement"))?;

        if let Some(key) = draft.dedup_key() {
            let dedup = self
                .dedup
                .read()
                .map_err(|_| Self::poisoned("commit_movement"))?;
            if let Some(existing) = dedup.get(&key) {
                return Ok(CommitOutcome::AlreadyRecorded {
                    movement: existing.clone(),
                    product: product.clone(),
                });
            }
        }

        let movement = draft.into_movement();
        {
            let mut movements = self
                .movements
                .write()
                .map_err(|_| Self::poisoned("commit_movement"))?;
            movements.push(movement.clone());
        }
        if let Some(key) = movement.dedup_key() {
            let mut dedup = self
                .dedup
                .write()
                .map_err(|_| Self::poisoned("commit_movement"))?;
            dedup.insert(key, movement.clone());
        }

        let next = fold::apply_delta(product.stock, movement.delta);
        product.project_stock(next);

        Ok(CommitOutcome::Committed {
            movement,
            product: product.clone(),
        })
    }

    async fn movements_by_product(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>> {
        let movements = self
            .movements
            .read()
            .map_err(|_| Self::poisoned("movements_by_product"))?;
        Ok(movements
            .iter()
            .rev()
            .filter(|m| m.product_id == product_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn movements_by_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        let movements = self
            .movements
            .read()
            .map_err(|_| Self::poisoned("movements_by_order"))?;
        Ok(movements
            .iter()
            .filter(|m| m.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn recent_movements(&self, limit: usize) -> StoreResult<Vec<StockMovement>> {
        let movements = self
            .movements
            .read()
            .map_err(|_| Self::poisoned("recent_movements"))?;
        Ok(movements.iter().rev().take(limit).cloned().collect())
    }

    async fn rebuild_stock(&self, product_id: ProductId) -> StoreResult<StockRebuild> {
        let slot = self.product_slot(product_id, "rebuild_stock")?;
        let mut product = slot.lock().map_err(|_| Self::poisoned("rebuild_stock"))?;

        let deltas = self.product_deltas(product_id, "rebuild_stock")?;
        let previous = product.stock;
        let replayed = fold::replay(deltas);
        product.project_stock(replayed);

        Ok(StockRebuild {
            product_id,
            previous,
            replayed,
        })
    }

    async fn stock_audit(&self) -> StoreResult<Vec<StockAudit>> {
        let slots: Vec<(ProductId, Arc<Mutex<Product>>)> = {
            let products = self
                .products
                .read()
                .map_err(|_| Self::poisoned("stock_audit"))?;
            products.iter().map(|(id, slot)| (*id, slot.clone())).collect()
        };

        let mut audits = Vec::with_capacity(slots.len());
        for (product_id, slot) in slots {
            let projected = {
                let product = slot.lock().map_err(|_| Self::poisoned("stock_audit"))?;
                product.stock
            };
            let deltas = self.product_deltas(product_id, "stock_audit")?;
            let ledger_sum: i64 = deltas.iter().sum();
            let replayed = fold::replay(deltas);
            audits.push(StockAudit {
                product_id,
                projected,
                ledger_sum,
                replayed,
                diverged: projected != ledger_sum,
            });
        }
        audits.sort_by_key(|a| a.product_id);
        Ok(audits)
    }
}
