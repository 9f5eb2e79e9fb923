use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

use super::policy::RateLimitOptions;
use super::window::{self, RateLimitOutcome};

/// Backing storage for per-client timestamp logs.
///
/// Logs are keyed by `(scope, identifier)`, where the scope is the policy the
/// request is counted against, so two policies never see each other's
/// requests. `check` must be atomic per key: two concurrent checks may not
/// both read the log before either appends to it. Swap [`MemoryStore`] for a
/// shared implementation to get a fleet-wide limit instead of a per-instance one.
pub trait RateLimitStore: Send + Sync + 'static {
    fn check(
        &self,
        scope: &str,
        identifier: &str,
        options: RateLimitOptions,
        now: i64,
    ) -> RateLimitOutcome;

    // prune each log by its own window, keeping at least retention_ms; returns deleted entries
    fn sweep(&self, now: i64, retention_ms: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// one client's log under one policy
#[derive(Debug)]
struct LogEntry {
    window_ms: i64,
    timestamps: VecDeque<i64>,
}

/// In-process store. Limits are not shared between instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, LogEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// identifiers carry addresses and user agents, keep only a digest
fn storage_key(scope: &str, identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update([0u8]);
    hasher.update(identifier.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl RateLimitStore for MemoryStore {
    fn check(
        &self,
        scope: &str,
        identifier: &str,
        options: RateLimitOptions,
        now: i64,
    ) -> RateLimitOutcome {
        // the entry guard holds the shard lock until the end of the match
        match self.entries.entry(storage_key(scope, identifier)) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.window_ms = entry.window_ms.max(options.window_millis());
                let outcome = window::apply(&mut entry.timestamps, options, now);
                if entry.timestamps.is_empty() {
                    occupied.remove();
                }
                outcome
            }
            Entry::Vacant(vacant) => {
                let mut timestamps = VecDeque::new();
                let outcome = window::apply(&mut timestamps, options, now);
                if !timestamps.is_empty() {
                    vacant.insert(LogEntry {
                        window_ms: options.window_millis(),
                        timestamps,
                    });
                }
                outcome
            }
        }
    }

    fn sweep(&self, now: i64, retention_ms: i64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep_ms = entry.window_ms.max(retention_ms);
            window::prune(&mut entry.timestamps, now.saturating_sub(keep_ms));
            let keep = !entry.timestamps.is_empty();
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_storage_key_is_stable_digest() {
        let key = storage_key("forms", "1.2.3.4:curl");
        assert_eq!(key.len(), 64);
        assert_eq!(key, storage_key("forms", "1.2.3.4:curl"));
        assert_ne!(key, storage_key("forms", "1.2.3.4:wget"));
        assert_ne!(key, storage_key("auth", "1.2.3.4:curl"));
        assert!(!key.contains("curl"));
    }

    #[test]
    fn test_entries_created_lazily() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.check("forms", "client", RateLimitOptions::FORMS, 0);
        assert_eq!(store.len(), 1);

        store.check("forms", "client", RateLimitOptions::FORMS, 1);
        store.check("forms", "other", RateLimitOptions::FORMS, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_scopes_do_not_share_logs() {
        let store = MemoryStore::new();
        let single = RateLimitOptions::new(60_000, 1).unwrap();

        assert!(store.check("a", "client", single, 0).allowed);
        assert!(store.check("b", "client", single, 0).allowed);
        assert!(!store.check("a", "client", single, 1).allowed);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_sweep_removes_only_aged_entries() {
        let store = MemoryStore::new();
        store.check("forms", "old", RateLimitOptions::FORMS, 0);
        store.check("forms", "mixed", RateLimitOptions::FORMS, 0);
        store.check("forms", "mixed", RateLimitOptions::FORMS, 65_000);
        store.check("forms", "fresh", RateLimitOptions::FORMS, 100_000);

        let removed = store.sweep(120_000, 1_000);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);

        let removed = store.sweep(200_000, 1_000);
        assert_eq!(removed, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_respects_entry_window_over_retention() {
        let store = MemoryStore::new();
        let two_hours = RateLimitOptions::new(2 * 60 * 60 * 1000, 1).unwrap();

        assert!(store.check("nightly", "client", two_hours, 0).allowed);

        // retention of one hour must not forget a request still inside the two hour window
        let removed = store.sweep(90 * 60 * 1000, 60 * 60 * 1000);
        assert_eq!(removed, 0);
        assert!(!store.check("nightly", "client", two_hours, 90 * 60 * 1000).allowed);

        let removed = store.sweep(2 * 60 * 60 * 1000 + 1, 60 * 60 * 1000);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_retention_floor_keeps_short_windows() {
        let store = MemoryStore::new();
        store.check("forms", "client", RateLimitOptions::FORMS, 0);

        assert_eq!(store.sweep(120_000, 24 * 60 * 60 * 1000), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_max() {
        let store = Arc::new(MemoryStore::new());
        let options = RateLimitOptions::new(60_000, 50).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| store.check("api", "shared", options, 1_000).allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
