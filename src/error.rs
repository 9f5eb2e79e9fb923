use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Raised at startup only, never on the request path
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("rate limit max must be greater than zero")]
    ZeroMax,

    #[error("policy '{name}': {source}")]
    InvalidPolicy {
        name: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("invalid policy spec '{spec}': {reason} (expected name=window_ms:max)")]
    InvalidPolicySpec { spec: String, reason: String },

    #[error("no policy named '{0}' is configured")]
    UnknownPolicy(String),

    #[error("cleanup interval must be greater than zero")]
    ZeroCleanupInterval,
}

// Errors surfaced to HTTP callers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown policy '{0}'")]
    UnknownPolicy(String),

    #[error("Failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::UnknownPolicy(_) => (StatusCode::NOT_FOUND, "Unknown policy"),
            ApiError::Metrics(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };

        let body = Json(serde_json::json!({
            "error": error,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
