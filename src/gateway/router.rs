//! HTTP router and shared state

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{any, get, post},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::auth::auth_gate;
use super::mock::{mock_handler, mock_without_path};
use super::proxy::{Forwarder, proxy_handler};
use crate::Result;
use crate::config::{AuthConfig, Config};
use crate::store::Store;

/// Shared application state
pub struct AppState {
    /// External store
    pub store: Arc<dyn Store>,
    /// Client for forwarded proxy calls
    pub forwarder: Forwarder,
    /// Auth gate configuration
    pub auth: AuthConfig,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl AppState {
    /// Build state from configuration and a store handle
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Result<Self> {
        Ok(Self {
            store,
            forwarder: Forwarder::new(&config.proxy)?,
            auth: config.auth.clone(),
            max_body_size: config.server.max_body_size,
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_size = state.max_body_size;

    Router::new()
        .route("/health", get(health_handler))
        // Wildcards never match an empty tail; answer those explicitly
        .route("/api/mock", any(mock_without_path))
        .route("/api/mock/", any(mock_without_path))
        .route("/api/mock/{*path}", any(mock_handler))
        .route("/api/proxy", post(proxy_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth_gate))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.kind(),
    }))
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "statusCode": 404,
            "statusMessage": "Page Not Found"
        })),
    )
}
