use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use defter_core::TenantId;
use defter_infra::{Database, Ledger, Reports};
use defter_notifications::Notification;

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Shared application services: the store, the ledger orchestrator, the
/// report aggregator, and the realtime channel.
#[derive(Clone)]
pub struct AppServices {
    db: Arc<Database>,
    ledger: Ledger,
    reports: Reports,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn new() -> Self {
        let db = Arc::new(Database::new());
        // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
        Self {
            ledger: Ledger::new(db.clone()),
            reports: Reports::new(db.clone()),
            db,
            realtime_tx,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn reports(&self) -> &Reports {
        &self.reports
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Broadcast freshly created notifications (lossy; no backpressure on
    /// the request path).
    pub fn publish_notifications(&self, tenant_id: TenantId, notifications: &[Notification]) {
        for notification in notifications {
            let _ = self.realtime_tx.send(RealtimeMessage {
                tenant_id,
                topic: "notifications.created".to_string(),
                payload: serde_json::json!({
                    "id": notification.id_typed().to_string(),
                    "kind": notification.kind(),
                    "message": notification.message(),
                    "related_id": notification.related_id().to_string(),
                }),
            });
        }
    }
}

impl Default for AppServices {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
