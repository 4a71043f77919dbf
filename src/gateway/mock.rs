//! Mock responder: replays stored response definitions.
//!
//! `ANY /api/mock/{*path}` looks up the single `inbound_apis` row for
//! `("/" + path, METHOD)`, checks its optional shared secret against the
//! `Authorization` header, logs the hit, and answers with the stored
//! status and body.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::auth::Session;
use super::router::AppState;
use super::{elapsed_ms, persist_log};
use crate::ApiError;
use crate::store::{LogEntry, LogType};

/// `ANY /api/mock/{*path}`
pub async fn mock_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    method: Method,
    Path(tail): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let actual_path = mock_path(&tail)?;
    let method = method.as_str().to_string();
    let ctx = session.store_context();

    debug!(path = %actual_path, method = %method, "Mock lookup");

    let definition = match state.store.find_inbound_api(&ctx, &actual_path, &method).await {
        Ok(Some(definition)) => definition,
        Ok(None) => return Err(ApiError::NotFound),
        Err(e) => {
            warn!(path = %actual_path, method = %method, error = %e, "Mock lookup failed");
            return Err(ApiError::NotFound);
        }
    };

    if let Some(expected) = definition.auth_token.as_deref().filter(|t| !t.is_empty()) {
        if !token_matches(expected, &headers) {
            debug!(path = %actual_path, method = %method, "Mock token mismatch");
            return Err(ApiError::Unauthorized);
        }
    }

    let entry = LogEntry {
        user_id: definition.user_id.clone(),
        log_type: LogType::Inbound,
        method,
        url: actual_path,
        status: definition.response_status,
        duration_ms: elapsed_ms(started),
    };
    persist_log(state.store.as_ref(), &ctx, &entry).await;

    Ok(replay(definition.response_status, definition.response_body))
}

/// `ANY /api/mock` and `ANY /api/mock/`
pub async fn mock_without_path() -> ApiError {
    invalid_path()
}

fn invalid_path() -> ApiError {
    ApiError::InvalidRequest("Invalid path".to_string())
}

/// Logical path for a wildcard tail: `users/1` -> `/users/1`.
/// Empty segments are kept, so `/api/mock//users` is `//users`.
pub fn mock_path(tail: &str) -> Result<String, ApiError> {
    if tail.is_empty() {
        return Err(invalid_path());
    }
    Ok(format!("/{tail}"))
}

/// Exact, case-sensitive comparison of the raw `Authorization` value
fn token_matches(expected: &str, headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .is_some_and(|actual| bool::from(actual.as_bytes().ct_eq(expected.as_bytes())))
}

/// Build the replayed response from a stored status and body
fn replay(status: u16, body: Value) -> Response {
    let Ok(status) = StatusCode::from_u16(status) else {
        warn!(status, "Stored response_status is not a valid HTTP status");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    match body {
        Value::Null => status.into_response(),
        Value::String(text) => (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        other => (status, Json(other)).into_response(),
    }
}
