use tracing::instrument;

use stockroom_catalog::Product;
use stockroom_core::{DomainError, OrderId, ProductId};
use stockroom_ledger::{MovementDraft, MovementReason, StockMovement};

use crate::error::{StoreError, StoreResult};
use crate::store::{CatalogStore, CommitOutcome, LedgerStore};

/// Request for a single ledger entry.
#[derive(Debug, Clone)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: MovementReason,
    pub order_id: Option<OrderId>,
    pub note: Option<String>,
}

/// A committed (or deduplicated) ledger entry with the resulting projection.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub product: Product,
    pub movement: StockMovement,
    pub already_recorded: bool,
}

/// Records stock movements against live products.
#[derive(Debug, Clone)]
pub struct StockService<S> {
    store: S,
}

impl<S> StockService<S>
where
    S: CatalogStore + LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate, gate on a live product, and commit one movement.
    ///
    /// A duplicate order-scoped movement is not an error: the stored entry
    /// comes back with `already_recorded` set and the projection untouched.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            delta = request.delta,
            reason = %request.reason
        ),
        err
    )]
    pub async fn adjust(&self, request: AdjustStock) -> StoreResult<Adjustment> {
        let draft = MovementDraft::new(
            request.product_id,
            request.delta,
            request.reason,
            request.order_id,
            request.note,
        )?;

        // Inactive products take no new movements, by id or otherwise.
        match self.store.product(draft.product_id).await? {
            Some(product) if product.is_active => {}
            _ => return Err(StoreError::Domain(DomainError::ProductNotFound)),
        }

        let outcome = self.store.commit_movement(draft).await?;
        let already_recorded = outcome.already_recorded();
        let (movement, product) = match outcome {
            CommitOutcome::Committed { movement, product }
            | CommitOutcome::AlreadyRecorded { movement, product } => (movement, product),
        };
        Ok(Adjustment {
            product,
            movement,
            already_recorded,
        })
    }
}
