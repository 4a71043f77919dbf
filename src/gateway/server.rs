//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::config::Config;
use crate::store::{self, Store};
use crate::{Error, Result};

/// API Workbench server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// External store
    store: Arc<dyn Store>,
}

impl Gateway {
    /// Create a gateway using the store named in the configuration
    pub fn new(config: Config) -> Result<Self> {
        let store = store::from_config(&config.store)?;
        Ok(Self::with_store(config, store))
    }

    /// Create a gateway over an existing store handle
    #[must_use]
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    /// Address the server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self
            .config
            .server
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host: {e}")))?;
        Ok(SocketAddr::new(host, self.config.server.port))
    }

    /// Run the gateway until Ctrl+C / SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_addr()?;
        let state = Arc::new(AppState::new(&self.config, Arc::clone(&self.store))?);
        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("API WORKBENCH v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(store = self.store.kind(), "External store");
        info!("  ANY  http://{addr}/api/mock/<path>  (mock responder)");
        info!("  POST http://{addr}/api/proxy        (outbound proxy)");
        if self.config.auth.require_login {
            info!(login = %self.config.auth.login_path, "LOGIN REQUIRED for non-public paths");
        } else {
            warn!("Login enforcement disabled - anonymous navigation allowed");
        }
        info!("============================================================");

        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
        let mut drain_rx = shutdown_tx.subscribe();

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(shutdown_tx))
                .await
        });

        tokio::select! {
            joined = &mut server => return flatten(joined),
            _ = drain_rx.recv() => {}
        }

        let drain = self.config.server.shutdown_timeout;
        match tokio::time::timeout(drain, server).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                warn!(timeout = ?drain, "Graceful shutdown timed out, dropping open connections");
                Ok(())
            }
        }
    }
}

fn flatten(joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined
        .map_err(|e| Error::Internal(e.to_string()))?
        .map_err(Error::Io)
}

/// Shutdown signal handler
async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
