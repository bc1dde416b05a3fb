pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::sync::watch;

use crate::worker::WorkerConfig;

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<WorkerConfig>,
}

/// Build the service router. Split out of `run_server` so tests can drive
/// it on an ephemeral listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/download", get(routes::download))
        .with_state(state)
}

/// Run the HTTP server.
pub async fn run_server(
    addr: SocketAddr,
    worker: Arc<WorkerConfig>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(AppState { worker });

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
