//! Shared fixtures for integration tests.
//!
//! Not every test binary uses every helper.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use api_workbench::config::Config;
use api_workbench::gateway::{AppState, create_router};
use api_workbench::store::{
    InMemoryStore, InboundApiDefinition, LogEntry, OutboundRequestTemplate, SessionUser, Store,
    StoreContext,
};
use api_workbench::{Error, Result};
use axum::Router;
use axum::body::Body;
use axum::http::Response;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Access token registered for [`test_user`]
pub const SESSION_TOKEN: &str = "session-token-1";

pub fn test_user() -> SessionUser {
    SessionUser {
        id: "user-1".to_string(),
        email: Some("dev@example.com".to_string()),
    }
}

/// Memory store with one registered session
pub fn store_with_session() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.add_session(SESSION_TOKEN, test_user());
    store
}

pub fn definition(path: &str, method: &str, status: u16, body: Value) -> InboundApiDefinition {
    InboundApiDefinition {
        path: path.to_string(),
        method: method.to_string(),
        response_status: status,
        response_body: body,
        auth_token: None,
        user_id: "owner-1".to_string(),
    }
}

pub fn router_for(store: Arc<dyn Store>, config: &Config) -> Router {
    let state = Arc::new(AppState::new(config, store).expect("state should build"));
    create_router(state)
}

pub fn router(store: Arc<dyn Store>) -> Router {
    router_for(store, &Config::default())
}

/// `Cookie` header value carrying the test session
pub fn session_cookie() -> String {
    format!("sb-access-token={SESSION_TOKEN}")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body should be JSON")
}

/// Serve `app` on an ephemeral port until the returned sender is dropped
pub async fn spawn_http_server(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });
    (addr, shutdown_tx)
}

/// A local address with nothing listening on it
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

/// Store whose writes always fail, and optionally its reads too
pub struct FailingStore {
    pub inner: InMemoryStore,
    pub fail_reads: bool,
}

impl FailingStore {
    pub fn new(fail_reads: bool) -> Self {
        let inner = InMemoryStore::new();
        inner.add_session(SESSION_TOKEN, test_user());
        Self { inner, fail_reads }
    }
}

#[async_trait::async_trait]
impl Store for FailingStore {
    fn kind(&self) -> &'static str {
        "failing"
    }

    async fn resolve_user(&self, access_token: &str) -> Result<Option<SessionUser>> {
        if self.fail_reads {
            return Err(Error::Store("auth backend unavailable".to_string()));
        }
        self.inner.resolve_user(access_token).await
    }

    async fn find_inbound_api(
        &self,
        ctx: &StoreContext,
        path: &str,
        method: &str,
    ) -> Result<Option<InboundApiDefinition>> {
        if self.fail_reads {
            return Err(Error::Store("relation does not exist".to_string()));
        }
        self.inner.find_inbound_api(ctx, path, method).await
    }

    async fn insert_log(&self, _ctx: &StoreContext, _entry: &LogEntry) -> Result<()> {
        Err(Error::Store("insert rejected".to_string()))
    }

    async fn insert_outbound_request(
        &self,
        _ctx: &StoreContext,
        _template: &OutboundRequestTemplate,
    ) -> Result<()> {
        Err(Error::Store("insert rejected".to_string()))
    }
}
