//! In-memory store.
//!
//! Tables live in `parking_lot::RwLock`s for the lifetime of the process.
//! Used for local development (`store.backend: memory`) and by the tests.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{InboundApiDefinition, LogEntry, OutboundRequestTemplate, SessionUser, Store, StoreContext};
use crate::config::StoreConfig;
use crate::{Error, Result};

/// Process-local implementation of [`Store`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inbound_apis: RwLock<Vec<InboundApiDefinition>>,
    logs: RwLock<Vec<LogEntry>>,
    outbound_requests: RwLock<Vec<OutboundRequestTemplate>>,
    sessions: RwLock<HashMap<String, SessionUser>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from configuration: sessions plus optional seed file
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let store = Self::new();
        for (token, user) in &config.sessions {
            store.add_session(token, user.clone());
        }
        if let Some(ref seed) = config.seed_file {
            let count = store.load_seed_file(seed)?;
            info!(file = %seed.display(), definitions = count, "Seeded mock definitions");
        }
        Ok(store)
    }

    /// Load a YAML list of definitions, returning how many were added
    pub fn load_seed_file(&self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read seed file {}: {e}", path.display()))
        })?;
        let definitions: Vec<InboundApiDefinition> = serde_yaml::from_str(&raw)?;
        let count = definitions.len();
        self.inbound_apis.write().extend(definitions);
        Ok(count)
    }

    /// Add a mock definition
    pub fn insert_inbound_api(&self, definition: InboundApiDefinition) {
        debug!(path = %definition.path, method = %definition.method, "Added mock definition");
        self.inbound_apis.write().push(definition);
    }

    /// Register an access token for a user
    pub fn add_session(&self, access_token: &str, user: SessionUser) {
        self.sessions.write().insert(access_token.to_string(), user);
    }

    /// Snapshot of the `logs` table
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().clone()
    }

    /// Snapshot of the `outbound_requests` table
    #[must_use]
    pub fn outbound_requests(&self) -> Vec<OutboundRequestTemplate> {
        self.outbound_requests.read().clone()
    }

    /// Snapshot of the `inbound_apis` table
    #[must_use]
    pub fn inbound_apis(&self) -> Vec<InboundApiDefinition> {
        self.inbound_apis.read().clone()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn resolve_user(&self, access_token: &str) -> Result<Option<SessionUser>> {
        Ok(self.sessions.read().get(access_token).cloned())
    }

    async fn find_inbound_api(
        &self,
        _ctx: &StoreContext,
        path: &str,
        method: &str,
    ) -> Result<Option<InboundApiDefinition>> {
        let table = self.inbound_apis.read();
        let mut matches = table.iter().filter(|d| d.path == path && d.method == method);

        // Single-row semantics: ambiguity is treated like a miss
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(Some(found.clone())),
            _ => Ok(None),
        }
    }

    async fn insert_log(&self, _ctx: &StoreContext, entry: &LogEntry) -> Result<()> {
        self.logs.write().push(entry.clone());
        Ok(())
    }

    async fn insert_outbound_request(
        &self,
        _ctx: &StoreContext,
        template: &OutboundRequestTemplate,
    ) -> Result<()> {
        self.outbound_requests.write().push(template.clone());
        Ok(())
    }
}
