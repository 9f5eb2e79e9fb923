use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use crate::error::ApiError;
use crate::metrics::TRACKED_CLIENTS;
use crate::state::AppState;

pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    TRACKED_CLIENTS.set(state.limiter.tracked_clients() as i64);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer))
}
