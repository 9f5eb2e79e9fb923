use std::sync::Arc;

use crate::rate_limit::{PolicyTable, RateLimiter};

// app's shared state

#[derive(Debug)]
pub struct AppState {
    pub limiter: RateLimiter,
    pub policies: PolicyTable,
}

impl AppState {
    pub fn new(limiter: RateLimiter, policies: PolicyTable) -> Arc<Self> {
        Arc::new(Self { limiter, policies })
    }
}
