//! Sliding-window rate limiting.
//!
//! Each client identifier owns a log of request timestamps (ms since epoch).
//! A check prunes the log down to the trailing window, decides, and appends
//! the new request if it was allowed. Logs that end up empty are dropped so
//! idle clients cost nothing.
//!
//! State lives in a [`RateLimitStore`]; the bundled [`MemoryStore`] keeps it
//! in-process, so limits are per instance. A shared store can be plugged in
//! behind the same [`RateLimiter::check_limit`] call.

pub mod cleanup;
pub mod limiter;
pub mod policy;
pub mod store;
pub mod window;

pub use cleanup::{CleanupConfig, spawn_cleanup};
pub use limiter::RateLimiter;
pub use policy::{PolicySpec, PolicyTable, RateLimitOptions};
pub use store::{MemoryStore, RateLimitStore};
pub use window::RateLimitOutcome;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
