use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, MovementId, OrderId, ProductId};

/// Why stock changed.
///
/// The two order-scoped reasons participate in duplicate suppression: at most
/// one movement may exist per `(order, product, reason)`, which is what makes
/// fulfillment and reversal idempotent under retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    /// Operator-entered correction (count fix, damage write-off).
    ManualAdjustment,
    /// Goods received into stock.
    Restock,
    /// Deduction applied when an order is paid.
    OrderFulfillment,
    /// Compensating entry when a paid order is cancelled or refunded.
    OrderReversal,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::ManualAdjustment => "manual_adjustment",
            MovementReason::Restock => "restock",
            MovementReason::OrderFulfillment => "order_fulfillment",
            MovementReason::OrderReversal => "order_reversal",
        }
    }

    /// True for reasons that must be tied to an order.
    pub fn is_order_scoped(&self) -> bool {
        matches!(
            self,
            MovementReason::OrderFulfillment | MovementReason::OrderReversal
        )
    }
}

impl core::fmt::Display for MovementReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_adjustment" => Ok(MovementReason::ManualAdjustment),
            "restock" => Ok(MovementReason::Restock),
            "order_fulfillment" => Ok(MovementReason::OrderFulfillment),
            "order_reversal" => Ok(MovementReason::OrderReversal),
            other => Err(DomainError::validation(format!(
                "unknown movement reason: {other}"
            ))),
        }
    }
}

/// One immutable ledger row.
///
/// `delta` is the *requested* change, recorded even when the projection
/// clamped the resulting stock at zero. That makes over-deductions visible
/// instead of silently rewriting history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: MovementReason,
    pub note: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The duplicate-suppression key, present only for order-scoped rows.
    pub fn dedup_key(&self) -> Option<(OrderId, ProductId, MovementReason)> {
        self.order_id.map(|order_id| (order_id, self.product_id, self.reason))
    }
}

/// A validated, not-yet-committed movement.
///
/// Construction enforces the write-side rules so stores can assume a draft
/// is well formed: a zero delta never reaches the ledger, order-scoped
/// reasons always carry their order id, and manual reasons never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: MovementReason,
    pub order_id: Option<OrderId>,
    pub note: Option<String>,
}

impl MovementDraft {
    pub fn new(
        product_id: ProductId,
        delta: i64,
        reason: MovementReason,
        order_id: Option<OrderId>,
        note: Option<String>,
    ) -> DomainResult<Self> {
        let draft = Self {
            product_id,
            delta,
            reason,
            order_id,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.delta == 0 {
            return Err(DomainError::validation("delta must be non-zero"));
        }
        match (self.reason.is_order_scoped(), self.order_id) {
            (true, None) => Err(DomainError::validation(format!(
                "reason {} requires an order_id",
                self.reason
            ))),
            (false, Some(_)) => Err(DomainError::validation(format!(
                "reason {} must not carry an order_id",
                self.reason
            ))),
            _ => Ok(()),
        }
    }

    /// The duplicate-suppression key, present only for order-scoped drafts.
    pub fn dedup_key(&self) -> Option<(OrderId, ProductId, MovementReason)> {
        self.order_id.map(|order_id| (order_id, self.product_id, self.reason))
    }

    /// Stamp the draft into a ledger row with a fresh id and timestamp.
    pub fn into_movement(self) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            product_id: self.product_id,
            delta: self.delta,
            reason: self.reason,
            note: self.note,
            order_id: self.order_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product_id() -> ProductId {
        ProductId::new()
    }

    fn test_order_id() -> OrderId {
        OrderId::new()
    }

    #[test]
    fn reason_serde_uses_snake_case() {
        let json = serde_json::to_string(&MovementReason::OrderFulfillment).unwrap();
        assert_eq!(json, "\"order_fulfillment\"");
        let back: MovementReason = serde_json::from_str("\"order_reversal\"").unwrap();
        assert_eq!(back, MovementReason::OrderReversal);
    }

    #[test]
    fn reason_round_trips_through_str() {
        for reason in [
            MovementReason::ManualAdjustment,
            MovementReason::Restock,
            MovementReason::OrderFulfillment,
            MovementReason::OrderReversal,
        ] {
            assert_eq!(reason.as_str().parse::<MovementReason>().unwrap(), reason);
        }
        assert!("shrink".parse::<MovementReason>().is_err());
    }

    #[test]
    fn zero_delta_is_rejected() {
        let err = MovementDraft::new(
            test_product_id(),
            0,
            MovementReason::ManualAdjustment,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn order_scoped_reason_requires_order_id() {
        let err = MovementDraft::new(
            test_product_id(),
            -2,
            MovementReason::OrderFulfillment,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn manual_reason_rejects_order_id() {
        let err = MovementDraft::new(
            test_product_id(),
            5,
            MovementReason::Restock,
            Some(test_order_id()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn valid_fulfillment_draft_keeps_its_key() {
        let product_id = test_product_id();
        let order_id = test_order_id();
        let draft = MovementDraft::new(
            product_id,
            -3,
            MovementReason::OrderFulfillment,
            Some(order_id),
            None,
        )
        .unwrap();
        assert_eq!(
            draft.dedup_key(),
            Some((order_id, product_id, MovementReason::OrderFulfillment))
        );
    }

    #[test]
    fn manual_draft_has_no_dedup_key() {
        let draft = MovementDraft::new(
            test_product_id(),
            7,
            MovementReason::Restock,
            None,
            None,
        )
        .unwrap();
        assert_eq!(draft.dedup_key(), None);
    }

    #[test]
    fn blank_note_collapses_to_none() {
        let draft = MovementDraft::new(
            test_product_id(),
            1,
            MovementReason::ManualAdjustment,
            None,
            Some("   ".to_string()),
        )
        .unwrap();
        assert_eq!(draft.note, None);
    }

    #[test]
    fn into_movement_preserves_requested_delta() {
        let draft = MovementDraft::new(
            test_product_id(),
            -50,
            MovementReason::ManualAdjustment,
            None,
            Some("cycle count".to_string()),
        )
        .unwrap();
        let movement = draft.clone().into_movement();
        assert_eq!(movement.delta, -50);
        assert_eq!(movement.product_id, draft.product_id);
        assert_eq!(movement.note.as_deref(), Some("cycle count"));
        assert_eq!(movement.order_id, None);
    }
}
