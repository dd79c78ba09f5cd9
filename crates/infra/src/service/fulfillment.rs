use serde::Serialize;
use tracing::instrument;

use stockroom_catalog::Product;
use stockroom_core::{DomainError, OrderId, ProductId};
use stockroom_ledger::MovementReason;
use stockroom_orders::OrderItem;

use crate::error::{StoreError, StoreResult};
use crate::service::stock::{AdjustStock, StockService};
use crate::store::{CatalogStore, LedgerStore, OrderStore};

/// Outcome of one line item (or one reversed movement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub line_no: u32,
    /// What the order line asked for, verbatim.
    pub requested: String,
    pub quantity: u64,
    /// Whether the line resolved to exactly one live product.
    pub matched: bool,
    pub product_id: Option<ProductId>,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub already_recorded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// Per-order summary of a deduction or restoration pass.
///
/// `newly_applied` counts successes that actually moved stock this pass;
/// re-runs that hit the ledger's duplicate guard succeed without counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub order_id: OrderId,
    pub successful: usize,
    pub failed: usize,
    pub newly_applied: usize,
    pub results: Vec<ItemOutcome>,
}

impl ReconciliationResult {
    fn collect(order_id: OrderId, results: Vec<ItemOutcome>) -> Self {
        let successful = results
            .iter()
            .filter(|r| r.status == ItemStatus::Success)
            .count();
        let newly_applied = results
            .iter()
            .filter(|r| r.status == ItemStatus::Success && !r.already_recorded)
            .count();
        Self {
            order_id,
            successful,
            failed: results.len() - successful,
            newly_applied,
            results,
        }
    }
}

/// Applies order-driven stock effects line by line.
///
/// One line failing never aborts the pass; the failure lands in that line's
/// outcome and every other line still gets its chance. Only backend failures
/// (lost connection, poisoned lock) abort the whole pass.
#[derive(Debug, Clone)]
pub struct FulfillmentService<S> {
    store: S,
    stock: StockService<S>,
}

impl<S> FulfillmentService<S>
where
    S: CatalogStore + OrderStore + LedgerStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            stock: StockService::new(store.clone()),
            store,
        }
    }

    /// Deduct stock for every line item of a paid order.
    ///
    /// Resolution prefers the line's product id when it points at a live
    /// product; otherwise the line's name is matched case-insensitively
    /// against live product names and SKUs. Zero or multiple matches fail the
    /// line rather than guessing. Safe to re-run: each line's deduction is
    /// deduplicated on `(order, product, reason)` in the ledger.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn reconcile_order(&self, order_id: OrderId) -> StoreResult<ReconciliationResult> {
        let items = self.store.order_items(order_id).await?;
        let mut results = Vec::with_capacity(items.len());

        for item in items {
            let outcome = self.deduct_item(order_id, &item).await?;
            results.push(outcome);
        }
        Ok(ReconciliationResult::collect(order_id, results))
    }

    /// Put back whatever the ledger says this order deducted.
    ///
    /// Works from the recorded fulfillment movements rather than the order's
    /// line items, so it restores exactly what was taken: lines that failed
    /// to deduct are skipped and requested deltas that were clamped still
    /// restore in full, leaving the surplus visible in the stock audit.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn reverse_order(&self, order_id: OrderId) -> StoreResult<ReconciliationResult> {
        let movements = self.store.movements_by_order(order_id).await?;
        let forward: Vec<_> = movements
            .into_iter()
            .filter(|m| m.reason == MovementReason::OrderFulfillment)
            .collect();

        let mut results = Vec::with_capacity(forward.len());
        for (index, movement) in forward.into_iter().enumerate() {
            let line_no = (index + 1) as u32;
            let request = AdjustStock {
                product_id: movement.product_id,
                delta: -movement.delta,
                reason: MovementReason::OrderReversal,
                order_id: Some(order_id),
                note: Some(format!("reversal of {}", movement.id)),
            };
            let outcome = match self.stock.adjust(request).await {
                Ok(adjustment) => ItemOutcome {
                    line_no,
                    requested: movement.product_id.to_string(),
                    quantity: movement.delta.unsigned_abs(),
                    matched: true,
                    product_id: Some(adjustment.product.id),
                    status: ItemStatus::Success,
                    error: None,
                    already_recorded: adjustment.already_recorded,
                },
                Err(StoreError::Domain(e)) => ItemOutcome {
                    line_no,
                    requested: movement.product_id.to_string(),
                    quantity: movement.delta.unsigned_abs(),
                    matched: false,
                    product_id: Some(movement.product_id),
                    status: ItemStatus::Failed,
                    error: Some(e.to_string()),
                    already_recorded: false,
                },
                Err(backend) => return Err(backend),
            };
            results.push(outcome);
        }
        Ok(ReconciliationResult::collect(order_id, results))
    }

    async fn deduct_item(&self, order_id: OrderId, item: &OrderItem) -> StoreResult<ItemOutcome> {
        let requested = requested_label(item);
        let quantity = item.quantity as u64;

        let product = match self.resolve_item(item).await {
            Ok(product) => product,
            Err(StoreError::Domain(e)) => {
                return Ok(ItemOutcome {
                    line_no: item.line_no,
                    requested,
                    quantity,
                    matched: false,
                    product_id: None,
                    status: ItemStatus::Failed,
                    error: Some(e.to_string()),
                    already_recorded: false,
                });
            }
            Err(backend) => return Err(backend),
        };

        let request = AdjustStock {
            product_id: product.id,
            delta: -(item.quantity as i64),
            reason: MovementReason::OrderFulfillment,
            order_id: Some(order_id),
            note: None,
        };
        match self.stock.adjust(request).await {
            Ok(adjustment) => Ok(ItemOutcome {
                line_no: item.line_no,
                requested,
                quantity,
                matched: true,
                product_id: Some(adjustment.product.id),
                status: ItemStatus::Success,
                error: None,
                already_recorded: adjustment.already_recorded,
            }),
            Err(StoreError::Domain(e)) => Ok(ItemOutcome {
                line_no: item.line_no,
                requested,
                quantity,
                matched: true,
                product_id: Some(product.id),
                status: ItemStatus::Failed,
                error: Some(e.to_string()),
                already_recorded: false,
            }),
            Err(backend) => Err(backend),
        }
    }

    /// Resolve a line item to exactly one live product, or say why not.
    async fn resolve_item(&self, item: &OrderItem) -> StoreResult<Product> {
        if let Some(id) = item.product_id {
            if let Some(product) = self.store.product(id).await? {
                if product.is_active {
                    return Ok(product);
                }
            }
            // Stale or inactive id: fall through to the name lookup.
        }

        let key = item.name.trim();
        if key.is_empty() {
            return Err(StoreError::Domain(DomainError::ProductNotFound));
        }
        let mut matches = self.store.find_active_by_key(key).await?;
        if matches.len() > 1 {
            let names: Vec<&str> = matches.iter().map(|p| p.name.as_str()).collect();
            return Err(StoreError::Domain(DomainError::ambiguous_match(format!(
                "{key:?} matches {}",
                names.join(", ")
            ))));
        }
        match matches.pop() {
            Some(product) => Ok(product),
            None => Err(StoreError::Domain(DomainError::ProductNotFound)),
        }
    }
}

fn requested_label(item: &OrderItem) -> String {
    if item.name.trim().is_empty() {
        item.product_id
            .map(|id| id.to_string())
            .unwrap_or_default()
    } else {
        item.name.clone()
    }
}
