//! HTTP server for persona prediction.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::Router;
use persona_ai::Predictor;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers.
pub struct AppState {
    /// ONNX sessions need `&mut` to run, so requests take turns.
    pub predictor: Mutex<Predictor>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor: Mutex::new(predictor),
            start_time: Instant::now(),
        }
    }
}

/// Build the router with tracing and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::predict_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C.
pub async fn run(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
