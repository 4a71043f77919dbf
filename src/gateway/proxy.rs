//! Outbound proxy: forwards a caller-described request and reports the result.
//!
//! Failures of the forwarded call never fail the handler. They are reported
//! in-band as `status: 500` with an `error` message, wrapped in a 200.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use reqwest::{
    Client, Method,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::auth::Session;
use super::router::AppState;
use super::{elapsed_ms, persist_log, persist_template};
use crate::config::ProxyConfig;
use crate::store::{LogEntry, LogType, OutboundRequestTemplate};
use crate::{ApiError, Result};

/// Body of `POST /api/proxy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    /// Target URL
    pub url: String,
    /// HTTP method (case-insensitive)
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers; numbers, booleans and null are sent as their JSON text
    #[serde(default)]
    pub headers: Option<HashMap<String, Value>>,
    /// JSON body, serialized as text for methods other than GET/HEAD.
    /// An explicit `null` is kept and sent as `null`.
    #[serde(default, deserialize_with = "present")]
    pub body: Option<Value>,
    /// Save the request as a named template when set
    #[serde(default)]
    pub name: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Content type of a forwarded body when the caller sets none
const DEFAULT_BODY_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Result of a forwarded call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    /// Upstream status, or 500 when the call failed
    pub status: u16,
    /// Upstream headers, lowercase names, repeated values joined with `", "`
    pub headers: BTreeMap<String, String>,
    /// JSON for `application/json` responses, otherwise the body text
    pub data: Value,
    /// Elapsed milliseconds
    pub duration: u64,
    /// Failure message, `None` on success
    pub error: Option<String>,
}

/// Issues forwarded requests over a shared client
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    timeout: Option<Duration>,
}

impl Forwarder {
    /// Create a forwarder from proxy configuration
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// Forward `request` and capture status, headers, body and timing.
    pub async fn forward(&self, request: &ProxyRequest) -> ProxyResponse {
        let started = Instant::now();
        let mut outcome = ProxyResponse {
            status: 0,
            headers: BTreeMap::new(),
            data: json!({}),
            duration: 0,
            error: None,
        };

        if let Err(message) = self.send(request, &mut outcome).await {
            outcome.status = 500;
            outcome.data = json!({});
            outcome.error = Some(message);
        }

        outcome.duration = elapsed_ms(started);
        outcome
    }

    async fn send(
        &self,
        request: &ProxyRequest,
        outcome: &mut ProxyResponse,
    ) -> std::result::Result<(), String> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| format!("Invalid HTTP method '{}': {e}", request.method))?;
        let mut headers = build_headers(request.headers.as_ref())?;
        let body = match request.body {
            Some(ref body) if method != Method::GET && method != Method::HEAD => {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static(DEFAULT_BODY_CONTENT_TYPE));
                Some(body.to_string())
            }
            _ => None,
        };

        let mut builder = self.client.request(method, &request.url).headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| describe(&e))?;

        outcome.status = response.status().as_u16();
        outcome.headers = flatten_headers(response.headers());

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        outcome.data = if is_json {
            response.json::<Value>().await.map_err(|e| describe(&e))?
        } else {
            Value::String(response.text().await.map_err(|e| describe(&e))?)
        };

        Ok(())
    }
}

/// `POST /api/proxy`
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: std::result::Result<Json<ProxyRequest>, JsonRejection>,
) -> std::result::Result<Json<ProxyResponse>, ApiError> {
    let Some(user) = session.user.clone() else {
        warn!("Proxy call without a session");
        return Err(ApiError::Unauthorized);
    };
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let result = state.forwarder.forward(&request).await;

    info!(
        user = %user.id,
        method = %request.method,
        url = %request.url,
        status = result.status,
        duration_ms = result.duration,
        failed = result.error.is_some(),
        "Proxied request"
    );

    let ctx = session.store_context();
    let entry = LogEntry {
        user_id: user.id.clone(),
        log_type: LogType::Outbound,
        method: request.method.clone(),
        url: request.url.clone(),
        status: result.status,
        duration_ms: result.duration,
    };
    persist_log(state.store.as_ref(), &ctx, &entry).await;

    if let Some(name) = request.name.as_deref().filter(|n| !n.is_empty()) {
        let template = OutboundRequestTemplate {
            user_id: user.id,
            name: name.to_string(),
            url: request.url.clone(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        };
        persist_template(state.store.as_ref(), &ctx, &template).await;
    }

    Ok(Json(result))
}

fn build_headers(
    headers: Option<&HashMap<String, Value>>,
) -> std::result::Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.into_iter().flatten() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid header name '{name}': {e}"))?;
        let text = match value {
            Value::String(text) => text.clone(),
            Value::Number(_) | Value::Bool(_) | Value::Null => value.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(format!("Invalid value for header '{name}': expected a scalar"));
            }
        };
        let header_value = HeaderValue::from_str(&text)
            .map_err(|e| format!("Invalid value for header '{name}': {e}"))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// Flatten a header map into `name -> "v1, v2"`
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), joined)
        })
        .collect()
}

/// Error message including its source chain
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
