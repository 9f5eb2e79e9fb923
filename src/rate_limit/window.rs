use chrono::{DateTime, SecondsFormat};
use std::collections::VecDeque;

use super::policy::RateLimitOptions;

/// Result of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub remaining: u32,
    // ms since epoch when the oldest counted request leaves the window
    pub reset_at: i64,
    pub limit: u32,
}

impl RateLimitOutcome {
    // whole seconds, rounded up, never negative
    pub fn retry_after_secs(&self, now: i64) -> i64 {
        let wait_ms = self.reset_at.saturating_sub(now).max(0);
        wait_ms.saturating_add(999) / 1000
    }

    pub fn reset_at_rfc3339(&self) -> String {
        DateTime::from_timestamp_millis(self.reset_at)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

// drops everything at or before cutoff
pub fn prune(timestamps: &mut VecDeque<i64>, cutoff: i64) {
    while timestamps.front().is_some_and(|&ts| ts <= cutoff) {
        timestamps.pop_front();
    }
}

/// Run one sliding-window check against a client's timestamp log.
///
/// The caller must hold exclusive access to `timestamps` for the whole call;
/// the prune, decide and append steps form a single read-modify-write.
pub fn apply(
    timestamps: &mut VecDeque<i64>,
    options: RateLimitOptions,
    now: i64,
) -> RateLimitOutcome {
    let window = options.window_millis();
    prune(timestamps, now.saturating_sub(window));

    let max = options.max();
    let in_window = timestamps.len();
    let allowed = in_window < max as usize;
    let remaining = (max as usize).saturating_sub(in_window + usize::from(allowed)) as u32;

    let oldest = timestamps.front().copied().unwrap_or(now);
    let reset_at = oldest.saturating_add(window);

    if allowed {
        // the wall clock can step backwards; keep the log ordered
        let stamp = timestamps.back().map_or(now, |&last| last.max(now));
        timestamps.push_back(stamp);
    }

    RateLimitOutcome {
        allowed,
        remaining,
        reset_at,
        limit: max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(window_ms: u64, max: u32) -> RateLimitOptions {
        RateLimitOptions::new(window_ms, max).unwrap()
    }

    #[test]
    fn test_prune_is_inclusive_of_cutoff() {
        let mut log: VecDeque<i64> = [10, 20, 30].into_iter().collect();
        prune(&mut log, 20);
        assert_eq!(log, VecDeque::from(vec![30]));
    }

    #[test]
    fn test_first_request_allowed() {
        let mut log = VecDeque::new();
        let outcome = apply(&mut log, options(1000, 3), 5_000);

        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 2);
        assert_eq!(outcome.reset_at, 6_000);
        assert_eq!(outcome.limit, 3);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_denied_request_not_recorded() {
        let mut log = VecDeque::from(vec![100]);
        let outcome = apply(&mut log, options(1000, 1), 200);

        assert!(!outcome.allowed);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.reset_at, 1_100);
        assert_eq!(log, VecDeque::from(vec![100]));
    }

    #[test]
    fn test_expired_entries_pruned_before_decision() {
        let mut log = VecDeque::from(vec![0, 10]);
        let outcome = apply(&mut log, options(1000, 2), 1_005);

        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.reset_at, 1_010);
        assert_eq!(log, VecDeque::from(vec![10, 1_005]));
    }

    #[test]
    fn test_clock_going_backwards_keeps_order() {
        let mut log = VecDeque::from(vec![500]);
        apply(&mut log, options(1000, 5), 400);
        assert_eq!(log, VecDeque::from(vec![500, 500]));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let outcome = RateLimitOutcome {
            allowed: false,
            remaining: 0,
            reset_at: 10_001,
            limit: 1,
        };
        assert_eq!(outcome.retry_after_secs(9_000), 2);
        assert_eq!(outcome.retry_after_secs(10_001), 0);
        assert_eq!(outcome.retry_after_secs(20_000), 0);
    }

    #[test]
    fn test_reset_at_iso_format() {
        let outcome = RateLimitOutcome {
            allowed: true,
            remaining: 1,
            reset_at: 1_700_000_000_123,
            limit: 2,
        };
        assert_eq!(outcome.reset_at_rfc3339(), "2023-11-14T22:13:20.123Z");
    }
}
