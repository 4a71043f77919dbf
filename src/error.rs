//! Error types for API Workbench

use std::io;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for API Workbench
pub type Result<T> = std::result::Result<T, Error>;

/// Internal errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External store rejected or failed a request
    #[error("Store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors that terminate a request with an HTTP status.
///
/// Rendered as `{"statusCode": .., "statusMessage": ..}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("{0}")]
    InvalidRequest(String),

    /// No matching mock definition (404)
    #[error("API Endpoint Not Found")]
    NotFound,

    /// Missing/mismatched token or missing session (401)
    #[error("Unauthorized")]
    Unauthorized,
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(json!({
                "statusCode": status.as_u16(),
                "statusMessage": self.to_string(),
            })),
        )
            .into_response()
    }
}
