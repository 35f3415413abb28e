use axum::{Extension, Json};
use flume::Sender;
use operator_api::HeartbeatStatus;
use tracing::error;

/// healthz handler
#[allow(clippy::unused_async)] // require by axum
pub(crate) async fn healthz() -> &'static str {
    "healthy"
}

/// sidecar monitor handler
#[allow(clippy::unused_async)] // require by axum
pub(crate) async fn sidecar_monitor(
    Extension(status_tx): Extension<Sender<HeartbeatStatus>>,
    Json(status): Json<HeartbeatStatus>,
) {
    if let Err(e) = status_tx.send(status) {
        error!("channel send error: {e}");
    }
}
