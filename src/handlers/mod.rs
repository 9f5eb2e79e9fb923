mod check;
mod health;
mod metrics;
mod policies;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ConfigError;
use crate::middleware::{PolicyGuard, enforce};
use crate::state::AppState;

pub use check::check_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use policies::policies_handler;

/// Policy guarding the service's own read endpoints.
pub const LISTING_POLICY: &str = "read";

// creating the router with routes
pub fn router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let listing_guard =
        PolicyGuard::from_table(state.limiter.clone(), &state.policies, LISTING_POLICY)?;

    let listing = Router::new()
        .route("/v1/policies", get(policies_handler))
        .layer(axum::middleware::from_fn_with_state(listing_guard, enforce));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/check/{policy}", post(check_handler))
        .merge(listing)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}
