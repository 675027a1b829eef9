pub mod signaling;

pub use signaling::*;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

/// `/store` upgrades to the store protocol, `/health` answers `ok`.
pub fn router(service: StoreService) -> Router {
    Router::new()
        .route("/store", get(store_ws_handler))
        .route("/health", get(health))
        .with_state(service)
}

/// Serves `service` on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, service: StoreService) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Signaling store listening on ws://{}/store", addr);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}
