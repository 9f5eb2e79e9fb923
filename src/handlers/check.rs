use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::middleware::{client_identifier, insert_rate_limit_headers, too_many_requests};
use crate::rate_limit::now_millis;
use crate::state::AppState;

// Body returned when a check passes
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: String,
}

/// Count one request from the caller against `policy`.
///
/// Meant to sit in front of an application: a proxy (or the application
/// itself) forwards the client's headers here and only proceeds on a 200.
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    Path(policy): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let options = state
        .policies
        .get(&policy)
        .ok_or_else(|| ApiError::UnknownPolicy(policy.clone()))?;

    let identifier = client_identifier(&headers);
    let now = now_millis();
    let outcome = state
        .limiter
        .check_policy_at(&policy, &identifier, options, now);

    if !outcome.allowed {
        warn!(policy = %policy, "rate limit exceeded");
        return Ok(too_many_requests(&outcome, now));
    }

    let body = CheckResponse {
        allowed: true,
        remaining: outcome.remaining,
        reset_at: outcome.reset_at_rfc3339(),
    };
    let mut response = Json(body).into_response();
    insert_rate_limit_headers(response.headers_mut(), &outcome);
    Ok(response)
}
