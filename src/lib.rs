//! Sliding-window rate limiting as a library and as a small HTTP service.
//!
//! * [`rate_limit`] holds the limiter, its policies and the cleanup task.
//! * [`middleware`] turns a request into a client identifier and a check
//!   result into a 429 response.
//! * [`handlers`] wires both into an axum router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
pub mod state;

pub use rate_limit::{RateLimitOptions, RateLimitOutcome, RateLimiter};
