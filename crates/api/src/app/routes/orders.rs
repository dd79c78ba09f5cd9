use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::{OrderId, ProductId};
use stockroom_infra::store::OrderStore;
use stockroom_orders::{FulfillmentType, Order, OrderItem, OrderStatus};

use crate::app::services::AppState;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/status", post(change_status))
}

pub async fn create_order(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let fulfillment_type: FulfillmentType = match body.fulfillment_type.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if body.items.is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "order needs at least one item",
        );
    }

    let order = Order::new(fulfillment_type);
    let mut items = Vec::with_capacity(body.items.len());
    for (idx, item) in body.items.into_iter().enumerate() {
        // Checkout data is taken as-is: a stale product_id or a name that is
        // really a SKU is not rejected here, the reconciler sorts it out.
        let product_id = match item.product_id.as_deref() {
            Some(raw) => match raw.parse::<ProductId>() {
                Ok(id) => Some(id),
                Err(e) => return errors::domain_error_to_response(e),
            },
            None => None,
        };
        match OrderItem::new(order.id, idx as u32 + 1, product_id, item.name, item.quantity) {
            Ok(built) => items.push(built),
            Err(e) => return errors::domain_error_to_response(e),
        }
    }

    if let Err(e) = state.store.insert_order(order.clone(), items.clone()).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(dto::order_to_json(&order, &items)),
    )
        .into_response()
}

pub async fn get_order(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
        }
    };
    let order = match state.store.order(id).await {
        Ok(Some(o)) => o,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found")
        }
        Err(e) => return errors::store_error_to_response(e),
    };
    let items = match state.store.order_items(id).await {
        Ok(items) => items,
        Err(e) => return errors::store_error_to_response(e),
    };
    (StatusCode::OK, Json(dto::order_to_json(&order, &items))).into_response()
}

pub async fn change_status(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    let id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
        }
    };
    let requested: OrderStatus = match body.status.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match state.status.change_status(id, requested).await {
        Ok(change) => {
            (StatusCode::OK, Json(dto::status_change_to_json(&change))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
