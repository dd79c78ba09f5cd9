use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use stockroom_core::{DomainError, OrderId};
use stockroom_orders::{plan_transition, Order, OrderStatus, StockEffect};

use crate::error::{StoreError, StoreResult};
use crate::notify::{StatusNotification, StatusNotifier};
use crate::service::fulfillment::{FulfillmentService, ReconciliationResult};
use crate::store::{CatalogStore, LedgerStore, OrderStore};

/// Result of a status change request.
///
/// `changed` is false when the order already sat in the requested status;
/// the entry effect still ran, so a half-applied earlier pass gets another
/// chance to converge.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub order: Order,
    pub changed: bool,
    pub stock_deducted: bool,
    pub stock_restored: bool,
    pub reconciliation: Option<ReconciliationResult>,
}

/// Drives the order lifecycle and its stock side effects.
#[derive(Clone)]
pub struct OrderStatusService<S> {
    store: S,
    fulfillment: FulfillmentService<S>,
    notifier: Arc<dyn StatusNotifier>,
}

impl<S> OrderStatusService<S>
where
    S: CatalogStore + OrderStore + LedgerStore + Clone,
{
    pub fn new(store: S, notifier: Arc<dyn StatusNotifier>) -> Self {
        Self {
            fulfillment: FulfillmentService::new(store.clone()),
            store,
            notifier,
        }
    }

    /// Move an order to `requested` and run the entering status's stock
    /// effect.
    ///
    /// The status write is a compare-and-swap on the loaded status. Losing
    /// the swap to a writer that set the same status degrades to a re-entry;
    /// losing it to any other writer surfaces as a conflict. The effect pass
    /// runs after the write and is idempotent, so a crash between the two
    /// heals on the next request for the same status.
    #[instrument(skip(self), fields(order_id = %order_id, requested = %requested), err)]
    pub async fn change_status(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> StoreResult<StatusChange> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(StoreError::Domain(DomainError::NotFound))?;
        let plan = plan_transition(order.status, requested, order.fulfillment_type)?;

        let mut changed = false;
        let order = if plan.changed {
            match self
                .store
                .update_order_status(order_id, order.status, plan.next)
                .await
            {
                Ok(updated) => {
                    changed = true;
                    updated
                }
                Err(StoreError::Domain(DomainError::Conflict(detail))) => {
                    let current = self
                        .store
                        .order(order_id)
                        .await?
                        .ok_or(StoreError::Domain(DomainError::NotFound))?;
                    if current.status == plan.next {
                        // Someone else got there first with the same status.
                        current
                    } else {
                        return Err(StoreError::Domain(DomainError::Conflict(detail)));
                    }
                }
                Err(other) => return Err(other),
            }
        } else {
            order
        };

        let mut stock_deducted = false;
        let mut stock_restored = false;
        let reconciliation = match plan.effect {
            StockEffect::Deduct => {
                let result = self.fulfillment.reconcile_order(order_id).await?;
                stock_deducted = result.newly_applied > 0;
                Some(result)
            }
            StockEffect::Restore => {
                let result = self.fulfillment.reverse_order(order_id).await?;
                stock_restored = result.newly_applied > 0;
                Some(result)
            }
            StockEffect::None => None,
        };

        if changed {
            self.notifier.notify(StatusNotification {
                order_id,
                status: order.status,
                changed,
                stock_deducted,
                stock_restored,
                occurred_at: Utc::now(),
            });
        }

        Ok(StatusChange {
            order,
            changed,
            stock_deducted,
            stock_restored,
            reconciliation,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use stockroom_catalog::Product;
    use stockroom_ledger::{MovementDraft, MovementReason};
    use stockroom_orders::{FulfillmentType, OrderItem};

    use super::*;
    use crate::store::InMemoryStore;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<StatusNotification>>,
    }

    impl StatusNotifier for Recorder {
        fn notify(&self, notification: StatusNotification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: OrderStatusService<Arc<InMemoryStore>>,
        recorder: Arc<Recorder>,
        product: Product,
        order: Order,
    }

    /// One product with `stock` on hand, one delivery order taking `quantity`.
    async fn fixture(stock: i64, quantity: u32) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let product = Product::new("Desk Lamp", Some("LAMP-01".to_string())).unwrap();
        store.insert_product(product.clone()).await.unwrap();
        store
            .commit_movement(
                MovementDraft::new(product.id, stock, MovementReason::Restock, None, None)
                    .unwrap(),
            )
            .await
            .unwrap();

        let order = Order::new(FulfillmentType::Delivery);
        let item = OrderItem::new(order.id, 1, Some(product.id), "Desk Lamp", quantity).unwrap();
        store.insert_order(order.clone(), vec![item]).await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let notifier: Arc<dyn StatusNotifier> = recorder.clone();
        let service = OrderStatusService::new(store.clone(), notifier);
        Fixture {
            store,
            service,
            recorder,
            product,
            order,
        }
    }

    #[tokio::test]
    async fn paying_deducts_stock() {
        let fx = fixture(10, 4).await;

        let change = fx
            .service
            .change_status(fx.order.id, OrderStatus::Paid)
            .await
            .unwrap();

        assert!(change.changed);
        assert!(change.stock_deducted);
        assert!(!change.stock_restored);
        assert_eq!(change.order.status, OrderStatus::Paid);
        let recon = change.reconciliation.unwrap();
        assert_eq!(recon.successful, 1);
        assert_eq!(recon.newly_applied, 1);

        let product = fx.store.product(fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 6);
        assert_eq!(fx.recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeating_paid_is_a_quiet_re_entry() {
        let fx = fixture(10, 4).await;
        fx.service
            .change_status(fx.order.id, OrderStatus::Paid)
            .await
            .unwrap();

        let again = fx
            .service
            .change_status(fx.order.id, OrderStatus::Paid)
            .await
            .unwrap();

        assert!(!again.changed);
        assert!(!again.stock_deducted);
        let recon = again.reconciliation.unwrap();
        assert_eq!(recon.successful, 1);
        assert_eq!(recon.newly_applied, 0);

        let product = fx.store.product(fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 6);
        // Only the first call notified.
        assert_eq!(fx.recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelling_a_paid_order_restores_stock() {
        let fx = fixture(10, 4).await;
        fx.service
            .change_status(fx.order.id, OrderStatus::Paid)
            .await
            .unwrap();

        let change = fx
            .service
            .change_status(fx.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        assert!(change.changed);
        assert!(change.stock_restored);
        assert!(!change.stock_deducted);

        let product = fx.store.product(fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 10);
    }

    #[tokio::test]
    async fn cancelling_an_unpaid_order_moves_no_stock() {
        let fx = fixture(10, 4).await;

        let change = fx
            .service
            .change_status(fx.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        assert!(change.changed);
        assert!(!change.stock_restored);
        let recon = change.reconciliation.unwrap();
        assert!(recon.results.is_empty());

        let product = fx.store.product(fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 10);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let fx = fixture(10, 4).await;

        let err = fx
            .service
            .change_status(fx.order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvalidTransition(_))
        ));

        let product = fx.store.product(fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 10);
        assert!(fx.recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let fx = fixture(10, 4).await;

        let err = fx
            .service
            .change_status(OrderId::new(), OrderStatus::Paid)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Domain(DomainError::NotFound));
    }

    #[tokio::test]
    async fn collection_order_walks_to_collected() {
        let store = Arc::new(InMemoryStore::new());
        let product = Product::new("Desk Lamp", None).unwrap();
        store.insert_product(product.clone()).await.unwrap();
        store
            .commit_movement(
                MovementDraft::new(product.id, 5, MovementReason::Restock, None, None).unwrap(),
            )
            .await
            .unwrap();
        let order = Order::new(FulfillmentType::Collection);
        let item = OrderItem::new(order.id, 1, Some(product.id), "Desk Lamp", 2).unwrap();
        store.insert_order(order.clone(), vec![item]).await.unwrap();
        let notifier: Arc<dyn StatusNotifier> = Arc::new(Recorder::default());
        let service = OrderStatusService::new(store.clone(), notifier);

        for status in [
            OrderStatus::Paid,
            OrderStatus::Packed,
            OrderStatus::Collected,
        ] {
            let change = service.change_status(order.id, status).await.unwrap();
            assert!(change.changed);
        }

        let err = service
            .change_status(order.id, OrderStatus::OutForDelivery)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvalidTransition(_))
        ));
    }
}
