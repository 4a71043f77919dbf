//! External store abstraction.
//!
//! The [`Store`] trait covers everything the handlers need from the hosted
//! backend: resolving a session token to a user, looking up mock
//! definitions, and appending `logs` / `outbound_requests` rows.
//!
//! Two bindings exist:
//!
//! - [`SupabaseStore`]: PostgREST tables and GoTrue user lookup over HTTP
//! - [`InMemoryStore`]: `parking_lot`-guarded tables, seeded from config
//!
//! Every row operation takes a [`StoreContext`] carrying the caller's access
//! token, so row-level security is evaluated as the caller.

pub mod memory;
pub mod supabase;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{StoreBackend, StoreConfig};
use crate::Result;

pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;

/// Table holding mock definitions
pub const INBOUND_APIS_TABLE: &str = "inbound_apis";
/// Table holding request logs
pub const LOGS_TABLE: &str = "logs";
/// Table holding saved outbound request templates
pub const OUTBOUND_REQUESTS_TABLE: &str = "outbound_requests";

/// A stored mock endpoint: `(path, method)` -> `(status, body)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundApiDefinition {
    /// Logical path, always starting with `/`
    pub path: String,
    /// Uppercase HTTP method
    pub method: String,
    /// Status code to replay
    pub response_status: u16,
    /// Body to replay verbatim
    #[serde(default)]
    pub response_body: Value,
    /// Shared secret the `Authorization` header must equal, if set
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Owner of the definition
    pub user_id: String,
}

/// Direction of a logged request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// Hit on a mock endpoint
    Inbound,
    /// Call made through the proxy
    Outbound,
}

/// One row of the `logs` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// User the request is attributed to
    pub user_id: String,
    /// Inbound or outbound
    #[serde(rename = "type")]
    pub log_type: LogType,
    /// HTTP method
    pub method: String,
    /// Mock path or proxied URL
    pub url: String,
    /// Resulting status code
    pub status: u16,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// One row of the `outbound_requests` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequestTemplate {
    /// Owner
    pub user_id: String,
    /// Template name
    pub name: String,
    /// Target URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request headers as supplied by the caller
    pub headers: Option<HashMap<String, Value>>,
    /// Request body as supplied by the caller
    pub body: Option<Value>,
}

/// A resolved session user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User identifier
    pub id: String,
    /// Email, when the auth backend reports one
    #[serde(default)]
    pub email: Option<String>,
}

/// Per-request credentials for store calls
#[derive(Debug, Clone, Default)]
pub struct StoreContext {
    /// Caller's access token; `None` means the anonymous key is used
    pub access_token: Option<String>,
}

impl StoreContext {
    /// Context acting with the caller's token
    #[must_use]
    pub fn with_token(access_token: Option<String>) -> Self {
        Self { access_token }
    }
}

/// Storage and session backend used by the handlers.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short backend name for logs and `/health`
    fn kind(&self) -> &'static str;

    /// Resolve an access token to a user. `Ok(None)` for unknown/expired tokens.
    async fn resolve_user(&self, access_token: &str) -> Result<Option<SessionUser>>;

    /// Find the single definition matching `path` and `method`.
    ///
    /// Returns `Ok(None)` when zero or more than one row matches.
    async fn find_inbound_api(
        &self,
        ctx: &StoreContext,
        path: &str,
        method: &str,
    ) -> Result<Option<InboundApiDefinition>>;

    /// Append a row to `logs`
    async fn insert_log(&self, ctx: &StoreContext, entry: &LogEntry) -> Result<()>;

    /// Append a row to `outbound_requests`
    async fn insert_outbound_request(
        &self,
        ctx: &StoreContext,
        template: &OutboundRequestTemplate,
    ) -> Result<()>;
}

/// Build the configured store binding
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Memory => {
            let store = InMemoryStore::from_config(config)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase => Ok(Arc::new(SupabaseStore::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_entry_wire_format() {
        let entry = LogEntry {
            user_id: "u1".to_string(),
            log_type: LogType::Outbound,
            method: "GET".to_string(),
            url: "https://example.com".to_string(),
            status: 200,
            duration_ms: 12,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "user_id": "u1",
                "type": "outbound",
                "method": "GET",
                "url": "https://example.com",
                "status": 200,
                "duration_ms": 12
            })
        );
    }

    #[test]
    fn test_definition_defaults() {
        let def: InboundApiDefinition = serde_json::from_value(json!({
            "path": "/users",
            "method": "GET",
            "response_status": 204,
            "user_id": "u1"
        }))
        .unwrap();
        assert_eq!(def.response_body, Value::Null);
        assert!(def.auth_token.is_none());
    }
}
