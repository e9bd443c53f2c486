//! HTTP API for the avatar chat service
//!
//! - `POST /chat` submits a job, `GET /chat/status/{job_id}` polls it
//! - `POST /prepare` pre-composes a face swap
//! - `GET /stats` reports stage latency and job counters

mod error;
mod handlers;
mod types;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use orchestrator::JobScheduler;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use handlers::*;
pub use types::*;

/// State shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: JobScheduler,
    /// Prefix joined with artifact names to form client URLs
    pub public_output_prefix: Arc<str>,
}

impl ApiState {
    pub fn new(scheduler: JobScheduler, public_output_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            scheduler,
            public_output_prefix: public_output_prefix.into(),
        }
    }
}

/// Build the router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/chat", post(submit_chat))
        .route("/chat/status/{job_id}", get(chat_status))
        .route("/prepare", post(prepare_material))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "API server listening");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
