use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

// configured policies as {name: {windowMs, max}}
pub async fn policies_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.policies.clone())
}
