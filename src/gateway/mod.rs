//! HTTP surface: auth gate, mock responder, outbound proxy

pub mod auth;
pub mod mock;
pub mod proxy;
mod router;
mod server;

use std::time::Instant;

use tracing::warn;

use crate::store::{LogEntry, OutboundRequestTemplate, Store, StoreContext};

pub use auth::{Session, auth_gate};
pub use proxy::{Forwarder, ProxyRequest, ProxyResponse};
pub use router::{AppState, create_router};
pub use server::Gateway;

/// Milliseconds since `started`
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Append a log row. Failures are reported, never propagated or retried.
pub(crate) async fn persist_log(store: &dyn Store, ctx: &StoreContext, entry: &LogEntry) {
    if let Err(e) = store.insert_log(ctx, entry).await {
        warn!(
            table = crate::store::LOGS_TABLE,
            url = %entry.url,
            error = %e,
            "Failed to persist log row"
        );
    }
}

/// Append an outbound request template. Same failure policy as [`persist_log`].
pub(crate) async fn persist_template(
    store: &dyn Store,
    ctx: &StoreContext,
    template: &OutboundRequestTemplate,
) {
    if let Err(e) = store.insert_outbound_request(ctx, template).await {
        warn!(
            table = crate::store::OUTBOUND_REQUESTS_TABLE,
            name = %template.name,
            error = %e,
            "Failed to persist outbound request template"
        );
    }
}
