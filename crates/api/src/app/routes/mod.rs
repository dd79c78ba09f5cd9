pub mod orders;
pub mod products;
pub mod stock;
pub mod system;

use axum::{routing::get, Router};

/// Everything that needs the shared [`AppState`](super::services::AppState)
/// extension. `/health` is wired separately so probes work before state does.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/products", products::router())
        .nest("/orders", orders::router())
        .nest("/stock", stock::router())
}
