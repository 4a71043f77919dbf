//! Auth gate middleware
//!
//! Runs ahead of every route:
//! - Reads the session access token from the session cookie
//! - Resolves it to a user through the store
//! - Attaches a [`Session`] to the request for downstream handlers
//! - Optionally redirects anonymous navigations to the login page
//!
//! The `Authorization` header is never consulted here: on the mock routes it
//! carries the mock definition's own shared secret.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info, warn};

use super::router::AppState;
use crate::config::AuthConfig;
use crate::store::{SessionUser, StoreContext};

/// Identity context for one request
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Resolved user, `None` for anonymous callers
    pub user: Option<SessionUser>,
    /// Raw access token from the session cookie
    pub access_token: Option<String>,
}

impl Session {
    /// Store credentials acting as this session
    #[must_use]
    pub fn store_context(&self) -> StoreContext {
        StoreContext::with_token(self.access_token.clone())
    }
}

/// Check if a path never redirects to login
#[must_use]
pub fn is_public_path(config: &AuthConfig, path: &str) -> bool {
    path == config.login_path || config.public_paths.iter().any(|p| path.starts_with(p))
}

/// Auth gate middleware
pub async fn auth_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let access_token = extract_cookie_value(request.headers(), &state.auth.session_cookie);

    let user = match access_token.as_deref() {
        Some(token) => match state.store.resolve_user(token).await {
            Ok(user) => user,
            Err(e) => {
                warn!(path = %path, error = %e, "Session lookup failed, continuing as anonymous");
                None
            }
        },
        None => None,
    };

    debug!(
        path = %path,
        user = user.as_ref().and_then(|u| u.email.as_deref()).unwrap_or("-"),
        "Auth gate"
    );

    if state.auth.require_login && user.is_none() && !is_public_path(&state.auth, &path) {
        info!(path = %path, login = %state.auth.login_path, "Redirecting to login");
        return Redirect::to(&state.auth.login_path).into_response();
    }

    request.extensions_mut().insert(Session { user, access_token });
    next.run(request).await
}

/// Value of `cookie_name` from the `Cookie` header, if present and non-empty
#[must_use]
pub fn extract_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim() == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_extract_cookie_value() {
        let h = headers("theme=dark; sb-access-token=abc.def.ghi; other=1");
        assert_eq!(
            extract_cookie_value(&h, "sb-access-token").as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_cookie_value(&h, "theme").as_deref(), Some("dark"));
        assert!(extract_cookie_value(&h, "missing").is_none());
    }

    #[test]
    fn test_extract_cookie_value_empty_and_absent() {
        assert!(extract_cookie_value(&headers("sb-access-token="), "sb-access-token").is_none());
        assert!(extract_cookie_value(&HeaderMap::new(), "sb-access-token").is_none());
    }

    #[test]
    fn test_extract_cookie_value_keeps_equals_in_value() {
        let h = headers("sb-access-token=a=b==");
        assert_eq!(extract_cookie_value(&h, "sb-access-token").as_deref(), Some("a=b=="));
    }

    #[test]
    fn test_public_paths() {
        let config = AuthConfig::default();
        assert!(is_public_path(&config, "/login"));
        assert!(is_public_path(&config, "/api/proxy"));
        assert!(is_public_path(&config, "/api/mock/users"));
        assert!(is_public_path(&config, "/health"));
        assert!(!is_public_path(&config, "/"));
        assert!(!is_public_path(&config, "/dashboard"));
    }

    #[test]
    fn test_login_path_always_public() {
        let config = AuthConfig {
            login_path: "/signin".to_string(),
            public_paths: vec![],
            ..Default::default()
        };
        assert!(is_public_path(&config, "/signin"));
        assert!(!is_public_path(&config, "/signup"));
    }
}
