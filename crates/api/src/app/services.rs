use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use stockroom_infra::notify::{StatusNotification, StatusNotifier};
use stockroom_infra::service::{OrderStatusService, StockService};
use stockroom_infra::store::{BackOfficeStore, InMemoryStore, PostgresStore};

/// Shared handles behind every route.
///
/// The store is a trait object so the in-memory and Postgres backings wire
/// identically; everything here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BackOfficeStore>,
    pub stock: StockService<Arc<dyn BackOfficeStore>>,
    pub status: OrderStatusService<Arc<dyn BackOfficeStore>>,
    pub realtime_tx: broadcast::Sender<StatusNotification>,
}

/// Notifier that fans committed status changes out to SSE subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    realtime_tx: broadcast::Sender<StatusNotification>,
}

impl BroadcastNotifier {
    pub fn new(realtime_tx: broadcast::Sender<StatusNotification>) -> Self {
        Self { realtime_tx }
    }
}

impl StatusNotifier for BroadcastNotifier {
    fn notify(&self, notification: StatusNotification) {
        // Lossy broadcast; no backpressure on the write path.
        let _ = self.realtime_tx.send(notification);
    }
}

pub async fn build_services() -> AppState {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let store: Arc<dyn BackOfficeStore> = if use_persistent {
        build_postgres_store().await
    } else {
        Arc::new(InMemoryStore::new())
    };

    // Realtime channel (SSE): lossy broadcast of committed status changes.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<StatusNotification>(256);
    let notifier: Arc<dyn StatusNotifier> = Arc::new(BroadcastNotifier::new(realtime_tx.clone()));

    AppState {
        stock: StockService::new(store.clone()),
        status: OrderStatusService::new(store.clone(), notifier),
        store,
        realtime_tx,
    }
}

async fn build_postgres_store() -> Arc<dyn BackOfficeStore> {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    let store = PostgresStore::new(pool);
    store
        .ensure_schema()
        .await
        .expect("Failed to create database schema");
    Arc::new(store)
}

/// Build the SSE stream of status notifications (used by `/stream`).
pub fn status_sse_stream(
    state: Arc<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.realtime_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(n) => {
            let data = serde_json::to_string(&n).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default()
                .event("order.status_changed")
                .data(data)))
        }
        // A lagged receiver skips what it missed and keeps reading.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
