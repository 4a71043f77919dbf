//! Supabase binding: PostgREST for tables, GoTrue for session lookup.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{
    INBOUND_APIS_TABLE, InboundApiDefinition, LOGS_TABLE, LogEntry, OUTBOUND_REQUESTS_TABLE,
    OutboundRequestTemplate, SessionUser, Store, StoreContext,
};
use crate::config::StoreConfig;
use crate::{Error, Result};

/// PostgREST single-object mode: 406 unless exactly one row matches
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// HTTP client for a Supabase project
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    /// Create a store for the project at `base_url`
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Create a store from configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| Error::Config("store.url is required for supabase".to_string()))?;
        let key = config
            .resolve_key()
            .ok_or_else(|| Error::Config("store.key is required for supabase".to_string()))?;
        Self::new(url, key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Attach `apikey` and the bearer for the caller (or the key itself)
    fn authorize(&self, request: RequestBuilder, ctx: &StoreContext) -> RequestBuilder {
        let bearer = ctx.access_token.as_deref().unwrap_or(&self.api_key);
        request
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn insert<T: Serialize + Sync>(
        &self,
        ctx: &StoreContext,
        table: &str,
        row: &T,
    ) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.table_url(table)), ctx)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(table = %table, "Inserted row");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Store(format!("insert into {table} failed ({status}): {body}")))
        }
    }
}

#[async_trait::async_trait]
impl Store for SupabaseStore {
    fn kind(&self) -> &'static str {
        "supabase"
    }

    async fn resolve_user(&self, access_token: &str) -> Result<Option<SessionUser>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(Some(response.json::<SessionUser>().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            s => Err(Error::Store(format!("user lookup failed ({s})"))),
        }
    }

    async fn find_inbound_api(
        &self,
        ctx: &StoreContext,
        path: &str,
        method: &str,
    ) -> Result<Option<InboundApiDefinition>> {
        let response = self
            .authorize(self.client.get(self.table_url(INBOUND_APIS_TABLE)), ctx)
            .header("Accept", SINGLE_OBJECT)
            .query(&[
                ("select", "*".to_string()),
                ("path", format!("eq.{path}")),
                ("method", format!("eq.{method}")),
            ])
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_ACCEPTABLE => Ok(None),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Store(format!(
                    "{INBOUND_APIS_TABLE} lookup failed ({s}): {body}"
                )))
            }
        }
    }

    async fn insert_log(&self, ctx: &StoreContext, entry: &LogEntry) -> Result<()> {
        self.insert(ctx, LOGS_TABLE, entry).await
    }

    async fn insert_outbound_request(
        &self,
        ctx: &StoreContext,
        template: &OutboundRequestTemplate,
    ) -> Result<()> {
        self.insert(ctx, OUTBOUND_REQUESTS_TABLE, template).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = SupabaseStore::new("https://abc.supabase.co/", "anon").unwrap();
        assert_eq!(
            store.table_url(LOGS_TABLE),
            "https://abc.supabase.co/rest/v1/logs"
        );
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = StoreConfig::default();
        assert!(SupabaseStore::from_config(&config).is_err());
    }
}
