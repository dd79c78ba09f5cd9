use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, OrderId, ProductId};

use crate::status::OrderStatus;

/// How the customer receives the goods. Decides which branch of the status
/// chain an order may take after `packed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Shipped to the customer (`packed -> out_for_delivery -> delivered`).
    Delivery,
    /// Picked up in store (`packed -> collected -> delivered`).
    Collection,
}

impl FulfillmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::Delivery => "delivery",
            FulfillmentType::Collection => "collection",
        }
    }
}

impl core::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for FulfillmentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(FulfillmentType::Delivery),
            "collection" => Ok(FulfillmentType::Collection),
            other => Err(DomainError::validation(format!(
                "unknown fulfillment type: {other}"
            ))),
        }
    }
}

/// An order as the back office sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub fulfillment_type: FulfillmentType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A freshly placed order.
    pub fn new(fulfillment_type: FulfillmentType) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            status: OrderStatus::Placed,
            fulfillment_type,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// One order line, exactly as checkout recorded it.
///
/// Upstream data is inconsistent: `product_id` may be missing or stale, and
/// `name` sometimes holds a SKU instead of a product name. The reconciler
/// deals with that; this type only guarantees a sane quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(
        order_id: OrderId,
        line_no: u32,
        product_id: Option<ProductId>,
        name: impl Into<String>,
        quantity: u32,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let name = name.into().trim().to_string();
        if name.is_empty() && product_id.is_none() {
            return Err(DomainError::validation(
                "line item needs a product_id or a name",
            ));
        }
        Ok(Self {
            order_id,
            line_no,
            product_id,
            name,
            quantity,
        })
    }
}
