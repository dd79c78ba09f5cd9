use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::{OrderId, ProductId};
use stockroom_infra::service::AdjustStock;
use stockroom_infra::store::LedgerStore;
use stockroom_ledger::MovementReason;

use crate::app::services::AppState;
use crate::app::{dto, errors};

const DEFAULT_MOVEMENT_LIMIT: usize = 50;
const MAX_MOVEMENT_LIMIT: usize = 500;

pub fn router() -> Router {
    Router::new()
        .route("/adjust", post(adjust_stock))
        .route("/movements", get(list_movements))
        .route("/rebuild", post(rebuild_stock))
        .route("/audit", get(stock_audit))
}

pub async fn adjust_stock(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
        }
    };
    let reason: MovementReason = match body.reason.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let order_id = match body.order_id.as_deref() {
        Some(raw) => match raw.parse::<OrderId>() {
            Ok(id) => Some(id),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid order id",
                )
            }
        },
        None => None,
    };

    let adjustment = match state
        .stock
        .adjust(AdjustStock {
            product_id,
            delta: body.delta,
            reason,
            order_id,
            note: body.note,
        })
        .await
    {
        Ok(a) => a,
        Err(e) => return errors::store_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "movement": dto::movement_to_json(&adjustment.movement),
            "product": dto::product_to_json(&adjustment.product),
            "already_recorded": adjustment.already_recorded,
        })),
    )
        .into_response()
}

pub async fn list_movements(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<dto::MovementsQuery>,
) -> axum::response::Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MOVEMENT_LIMIT)
        .min(MAX_MOVEMENT_LIMIT);

    let movements = match (query.product_id.as_deref(), query.order_id.as_deref()) {
        (Some(_), Some(_)) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "pass product_id or order_id, not both",
            )
        }
        (Some(raw), None) => {
            let product_id: ProductId = match raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    return errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "invalid_id",
                        "invalid product id",
                    )
                }
            };
            state.store.movements_by_product(product_id, limit).await
        }
        (None, Some(raw)) => {
            let order_id: OrderId = match raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    return errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "invalid_id",
                        "invalid order id",
                    )
                }
            };
            state.store.movements_by_order(order_id).await
        }
        (None, None) => state.store.recent_movements(limit).await,
    };

    match movements {
        Ok(movements) => {
            let items = movements.iter().map(dto::movement_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn rebuild_stock(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::RebuildStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
        }
    };
    match state.store.rebuild_stock(product_id).await {
        Ok(rebuild) => (StatusCode::OK, Json(rebuild)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn stock_audit(Extension(state): Extension<Arc<AppState>>) -> axum::response::Response {
    match state.store.stock_audit().await {
        Ok(rows) => (StatusCode::OK, Json(serde_json::json!({ "items": rows }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
