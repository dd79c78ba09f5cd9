use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::sse::Event as SseEvent,
};

use crate::app::services::{self, AppState};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Live feed of committed order status changes.
pub async fn stream(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>>
{
    services::status_sse_stream(state)
}
