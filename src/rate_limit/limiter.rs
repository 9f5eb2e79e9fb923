use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::policy::RateLimitOptions;
use super::store::{MemoryStore, RateLimitStore};
use super::window::RateLimitOutcome;
use crate::metrics::{CHECK_LATENCY, CHECKS_TOTAL, REJECTIONS_TOTAL, TRACKED_CLIENTS};

/// Sliding-window rate limiter over a pluggable store.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_clients", &self.store.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store<S: RateLimitStore>(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Check and record a request from `identifier` at the current time.
    ///
    /// Calls with different options never share a log. Prefer
    /// [`check_policy`](Self::check_policy) when the options come from a named policy.
    pub fn check_limit(&self, identifier: &str, options: RateLimitOptions) -> RateLimitOutcome {
        self.check_limit_at(identifier, options, super::now_millis())
    }

    pub fn check_limit_at(
        &self,
        identifier: &str,
        options: RateLimitOptions,
        now: i64,
    ) -> RateLimitOutcome {
        let scope = format!("{}ms/{}", options.window_ms(), options.max());
        self.check_policy_at(&scope, identifier, options, now)
    }

    /// Check and record a request counted against the policy named `policy`.
    pub fn check_policy(
        &self,
        policy: &str,
        identifier: &str,
        options: RateLimitOptions,
    ) -> RateLimitOutcome {
        self.check_policy_at(policy, identifier, options, super::now_millis())
    }

    pub fn check_policy_at(
        &self,
        policy: &str,
        identifier: &str,
        options: RateLimitOptions,
        now: i64,
    ) -> RateLimitOutcome {
        let start = Instant::now();
        let outcome = self.store.check(policy, identifier, options, now);
        CHECK_LATENCY.observe(start.elapsed().as_secs_f64());

        CHECKS_TOTAL.inc();
        if !outcome.allowed {
            REJECTIONS_TOTAL.inc();
        }
        debug!(
            policy,
            allowed = outcome.allowed,
            remaining = outcome.remaining,
            limit = outcome.limit,
            "rate limit check"
        );

        outcome
    }

    // each entry keeps at least its own window; retention only extends that
    pub fn cleanup(&self, retention: Duration) -> usize {
        self.cleanup_at(super::now_millis(), retention)
    }

    pub fn cleanup_at(&self, now: i64, retention: Duration) -> usize {
        let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let removed = self.store.sweep(now, retention_ms);
        TRACKED_CLIENTS.set(self.store.len() as i64);
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.store.len()
    }
}
