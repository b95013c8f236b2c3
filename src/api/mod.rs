//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::engine::TransferEngine;
use crate::store::RecordStore;

pub use routes::create_router;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub engine: Arc<TransferEngine>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, engine: TransferEngine) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
        }
    }
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    // Layers run in reverse order of addition: context -> logging -> handler
    let api_router = create_router()
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(axum::middleware::from_fn(middleware::context_middleware));

    Router::new()
        // Health check (no request user needed)
        .route("/health", get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
