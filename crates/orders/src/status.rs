//! Order status lifecycle rules.
//!
//! [`plan_transition`] is the single authority on which status changes are
//! legal and which stock side effect each one implies. It is pure: callers
//! (the status service) execute the plan against the store and the ledger.

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult};

use crate::order::FulfillmentType;

/// Where an order is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Paid,
    Packed,
    Collected,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Paid => "paid",
            OrderStatus::Packed => "packed",
            OrderStatus::Collected => "collected",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Terminal states admit no further transitions (re-requests of the same
    /// state aside).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "paid" => Ok(OrderStatus::Paid),
            "packed" => Ok(OrderStatus::Packed),
            "collected" => Ok(OrderStatus::Collected),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(DomainError::validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// The ledger side effect a transition implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// Pure metadata change.
    None,
    /// Run the fulfillment pass (one `order_fulfillment` deduction per line).
    Deduct,
    /// Run the reversal pass (one `order_reversal` per prior deduction).
    ///
    /// Always safe: the pass derives from the ledger, so if nothing was ever
    /// deducted (cancel straight from `placed`) it finds nothing to restore.
    Restore,
}

/// A legal transition, ready to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: OrderStatus,
    /// False when the order already has the requested status. The effect pass
    /// still runs so retries and webhook replays converge through the
    /// ledger's duplicate suppression.
    pub changed: bool,
    pub effect: StockEffect,
}

/// Decide whether `requested` is a legal next status and what it implies.
///
/// Re-requesting the current status is always accepted (`changed = false`);
/// that is what makes a double-clicked "mark paid" or a replayed payment
/// webhook harmless. Every other pair not in the table is rejected.
pub fn plan_transition(
    current: OrderStatus,
    requested: OrderStatus,
    fulfillment: FulfillmentType,
) -> DomainResult<TransitionPlan> {
    if requested == current {
        return Ok(TransitionPlan {
            next: current,
            changed: false,
            effect: entry_effect(requested),
        });
    }

    let legal = match (current, requested) {
        (OrderStatus::Placed, OrderStatus::Paid) => true,
        (OrderStatus::Placed, OrderStatus::Cancelled) => true,

        (OrderStatus::Paid, OrderStatus::Packed) => true,
        (OrderStatus::Paid, OrderStatus::Cancelled) => true,
        (OrderStatus::Paid, OrderStatus::Refunded) => true,

        (OrderStatus::Packed, OrderStatus::Collected) => {
            fulfillment == FulfillmentType::Collection
        }
        (OrderStatus::Packed, OrderStatus::OutForDelivery) => {
            fulfillment == FulfillmentType::Delivery
        }
        (OrderStatus::Packed, OrderStatus::Cancelled) => true,
        (OrderStatus::Packed, OrderStatus::Refunded) => true,

        // Once collected the goods are with the customer; the only forward
        // step is confirming delivery, and money comes back via refund.
        (OrderStatus::Collected, OrderStatus::Delivered) => true,
        (OrderStatus::Collected, OrderStatus::Refunded) => true,

        (OrderStatus::OutForDelivery, OrderStatus::Delivered) => true,
        (OrderStatus::OutForDelivery, OrderStatus::Cancelled) => true,
        (OrderStatus::OutForDelivery, OrderStatus::Refunded) => true,

        // delivered / cancelled / refunded are terminal.
        _ => false,
    };

    if !legal {
        return Err(DomainError::invalid_transition(format!(
            "{current} -> {requested}"
        )));
    }

    Ok(TransitionPlan {
        next: requested,
        changed: true,
        effect: entry_effect(requested),
    })
}

/// The stock effect of entering (or re-entering) a status.
fn entry_effect(status: OrderStatus) -> StockEffect {
    match status {
        OrderStatus::Paid => StockEffect::Deduct,
        OrderStatus::Cancelled | OrderStatus::Refunded => StockEffect::Restore,
        _ => StockEffect::None,
    }
}
