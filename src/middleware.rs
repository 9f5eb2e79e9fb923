//! Request-boundary glue: who is calling, and what a rejection looks like.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::warn;

use crate::error::ConfigError;
use crate::rate_limit::{PolicyTable, RateLimitOptions, RateLimitOutcome, RateLimiter, now_millis};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const UNKNOWN: &str = "unknown";

/// Derive the limiter key for a request: `<client address>:<user agent>`.
///
/// The address comes from `x-forwarded-for`, then `x-real-ip`. Both headers
/// and the user agent are client-controlled, so a caller can rotate them to
/// dodge the limit. Put a proxy that overwrites them in front of this service
/// when the limit guards anything security-sensitive.
pub fn client_identifier(headers: &HeaderMap) -> String {
    // non-ASCII bytes are kept (lossily) so such clients still get their own bucket
    let value_of = |name: &str| {
        headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .filter(|s| !s.is_empty())
    };

    let address = value_of("x-forwarded-for")
        .or_else(|| value_of("x-real-ip"))
        .unwrap_or(Cow::Borrowed(UNKNOWN));
    let user_agent = value_of("user-agent").unwrap_or(Cow::Borrowed(UNKNOWN));

    format!("{}:{}", address, user_agent)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    pub error: &'static str,
    pub message: &'static str,
    pub retry_after: i64,
}

pub fn insert_rate_limit_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(outcome.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(outcome.remaining));
    if let Ok(reset) = HeaderValue::from_str(&outcome.reset_at_rfc3339()) {
        headers.insert(X_RATELIMIT_RESET, reset);
    }
}

// `now` is the time the check ran
pub fn too_many_requests(outcome: &RateLimitOutcome, now: i64) -> Response {
    let retry_after = outcome.retry_after_secs(now);
    let body = RateLimitedBody {
        error: "Too many requests",
        message: "Rate limit exceeded. Please try again later.",
        retry_after,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    insert_rate_limit_headers(headers, outcome);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// Limiter bound to one named policy, used as middleware state.
#[derive(Debug, Clone)]
pub struct PolicyGuard {
    limiter: RateLimiter,
    policy: Arc<str>,
    options: RateLimitOptions,
}

impl PolicyGuard {
    pub fn new(limiter: RateLimiter, policy: &str, options: RateLimitOptions) -> Self {
        Self {
            limiter,
            policy: Arc::from(policy),
            options,
        }
    }

    /// Look `policy` up in `table`. Call while building the router so a typo
    /// fails at startup.
    pub fn from_table(
        limiter: RateLimiter,
        table: &PolicyTable,
        policy: &str,
    ) -> Result<Self, ConfigError> {
        let options = table
            .get(policy)
            .ok_or_else(|| ConfigError::UnknownPolicy(policy.to_string()))?;
        Ok(Self::new(limiter, policy, options))
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }
}

/// Axum middleware: reject with 429 before the handler runs, otherwise tag
/// the handler's response with the current limits.
///
/// ```ignore
/// let guard = PolicyGuard::from_table(limiter, &policies, "forms")?;
/// let router = Router::new()
///     .route("/submit", post(submit))
///     .layer(axum::middleware::from_fn_with_state(guard, enforce));
/// ```
pub async fn enforce(State(guard): State<PolicyGuard>, request: Request, next: Next) -> Response {
    let identifier = client_identifier(request.headers());
    let now = now_millis();
    let outcome = guard
        .limiter
        .check_policy_at(&guard.policy, &identifier, guard.options, now);

    if !outcome.allowed {
        warn!(policy = %guard.policy, path = %request.uri().path(), "rate limit exceeded");
        return too_many_requests(&outcome, now);
    }

    let mut response = next.run(request).await;
    insert_rate_limit_headers(response.headers_mut(), &outcome);
    response
}
