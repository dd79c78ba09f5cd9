use serde::Deserialize;

use stockroom_catalog::Product;
use stockroom_infra::service::StatusChange;
use stockroom_ledger::StockMovement;
use stockroom_orders::{Order, OrderItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: Option<String>,
    /// Opening stock; recorded as a restock movement, never written directly.
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetProductActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub fulfillment_type: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub delta: i64,
    pub reason: String,
    pub order_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RebuildStockRequest {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub limit: Option<usize>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn product_to_json(p: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": p.id,
        "name": p.name,
        "sku": p.sku,
        "stock": p.stock,
        "is_active": p.is_active,
        "created_at": p.created_at,
        "updated_at": p.updated_at,
    })
}

pub fn order_to_json(o: &Order, items: &[OrderItem]) -> serde_json::Value {
    serde_json::json!({
        "id": o.id,
        "status": o.status,
        "fulfillment_type": o.fulfillment_type,
        "items": items.iter().map(order_item_to_json).collect::<Vec<_>>(),
        "created_at": o.created_at,
        "updated_at": o.updated_at,
    })
}

pub fn order_item_to_json(item: &OrderItem) -> serde_json::Value {
    serde_json::json!({
        "line_no": item.line_no,
        "product_id": item.product_id,
        "name": item.name,
        "quantity": item.quantity,
    })
}

pub fn movement_to_json(m: &StockMovement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id,
        "product_id": m.product_id,
        "delta": m.delta,
        "reason": m.reason,
        "note": m.note,
        "order_id": m.order_id,
        "created_at": m.created_at,
    })
}

pub fn status_change_to_json(change: &StatusChange) -> serde_json::Value {
    serde_json::json!({
        "order": {
            "id": change.order.id,
            "status": change.order.status,
            "fulfillment_type": change.order.fulfillment_type,
            "created_at": change.order.created_at,
            "updated_at": change.order.updated_at,
        },
        "changed": change.changed,
        "stock_deducted": change.stock_deducted,
        "stock_restored": change.stock_restored,
        "reconciliation": &change.reconciliation,
    })
}
