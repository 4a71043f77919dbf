//! API Workbench
//!
//! Mock API responder and outbound request proxy on top of a hosted
//! Supabase project.
//!
//! # Features
//!
//! - **Mock Responder**: `ANY /api/mock/{*path}` replays stored response definitions
//! - **Outbound Proxy**: `POST /api/proxy` forwards a request and reports status, headers, body and timing
//! - **Auth Gate**: resolves the session user for every request, optional login redirect
//! - **Request Logs**: every mock hit and proxied call is appended to the `logs` table
//!
//! The external store is abstracted behind [`store::Store`], with a Supabase
//! (PostgREST + GoTrue) binding and an in-memory binding for local use.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;

pub use error::{ApiError, Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
