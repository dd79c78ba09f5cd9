use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_catalog::Product;
use stockroom_core::ProductId;
use stockroom_infra::service::AdjustStock;
use stockroom_infra::store::CatalogStore;
use stockroom_ledger::MovementReason;

use crate::app::services::AppState;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/active", post(set_product_active))
}

pub async fn create_product(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    if body.initial_stock < 0 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "initial_stock must not be negative",
        );
    }

    let mut product = match Product::new(body.name, body.sku) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = state.store.insert_product(product.clone()).await {
        return errors::store_error_to_response(e);
    }

    // Opening stock enters through the ledger like any other receipt, so the
    // projection stays derivable from movements alone.
    if body.initial_stock > 0 {
        match state
            .stock
            .adjust(AdjustStock {
                product_id: product.id,
                delta: body.initial_stock,
                reason: MovementReason::Restock,
                order_id: None,
                note: Some("opening stock".to_string()),
            })
            .await
        {
            Ok(adjustment) => product = adjustment.product,
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response()
}

pub async fn list_products(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Response {
    let products = match state.store.products().await {
        Ok(products) => products,
        Err(e) => return errors::store_error_to_response(e),
    };
    let items = products.iter().map(dto::product_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_product(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
        }
    };
    match state.store.product(id).await {
        Ok(Some(p)) => (StatusCode::OK, Json(dto::product_to_json(&p))).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "product_not_found",
            "product not found",
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn set_product_active(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetProductActiveRequest>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
        }
    };
    match state.store.set_product_active(id, body.active).await {
        Ok(p) => (StatusCode::OK, Json(dto::product_to_json(&p))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
