use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use super::limiter::RateLimiter;
use super::policy::PolicyTable;
use crate::error::ConfigError;
use crate::metrics::CLEANUP_REMOVED_TOTAL;

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupConfig {
    pub interval: Duration,
    // minimum history kept per entry; entries with a longer window keep their window
    pub retention: Duration,
}

impl CleanupConfig {
    /// Retention defaults to the largest window in `policies`.
    pub fn for_policies(
        policies: &PolicyTable,
        interval: Duration,
        retention: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroCleanupInterval);
        }

        let retention =
            retention.unwrap_or_else(|| policies.largest_window().unwrap_or(interval));

        Ok(Self {
            interval,
            retention,
        })
    }
}

/// The sweeper exits once `shutdown` carries `true` or its sender is dropped.
pub fn spawn_cleanup(
    limiter: RateLimiter,
    config: CleanupConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Rate limit cleanup started (interval: {:?}, retention: {:?})",
            config.interval, config.retention
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.cleanup(config.retention);
                    CLEANUP_REMOVED_TOTAL.inc_by(removed as u64);
                    debug!(
                        removed,
                        tracked = limiter.tracked_clients(),
                        "rate limit cleanup sweep"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Rate limit cleanup stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{RateLimitOptions, now_millis};

    #[test]
    fn test_retention_defaults_to_largest_window() {
        let config =
            CleanupConfig::for_policies(&PolicyTable::presets(), DEFAULT_CLEANUP_INTERVAL, None)
                .unwrap();
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.interval, DEFAULT_CLEANUP_INTERVAL);
    }

    #[test]
    fn test_explicit_retention_kept() {
        let config = CleanupConfig::for_policies(
            &PolicyTable::presets(),
            DEFAULT_CLEANUP_INTERVAL,
            Some(Duration::from_secs(24 * 60 * 60)),
        )
        .unwrap();
        assert_eq!(config.retention, Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn test_sweeper_keeps_windows_longer_than_retention() {
        let limiter = RateLimiter::new();
        let long = RateLimitOptions::new(2 * 60 * 60 * 1000, 1).unwrap();
        limiter.check_policy_at("nightly", "client", long, now_millis() - 10_000);

        let (tx, rx) = watch::channel(false);
        let config = CleanupConfig {
            interval: Duration::from_millis(10),
            retention: Duration::from_millis(1000),
        };
        let handle = spawn_cleanup(limiter.clone(), config, rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(!limiter.check_policy("nightly", "client", long).allowed);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = CleanupConfig::for_policies(&PolicyTable::presets(), Duration::ZERO, None)
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCleanupInterval);
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_aged_entries() {
        let limiter = RateLimiter::new();
        let opts = RateLimitOptions::new(1000, 5).unwrap();
        limiter.check_limit_at("stale", opts, now_millis() - 10_000);
        assert_eq!(limiter.tracked_clients(), 1);

        let (tx, rx) = watch::channel(false);
        let config = CleanupConfig {
            interval: Duration::from_millis(10),
            retention: Duration::from_millis(1000),
        };
        let handle = spawn_cleanup(limiter.clone(), config, rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let config = CleanupConfig {
            interval: Duration::from_secs(3600),
            retention: Duration::from_secs(3600),
        };
        let handle = spawn_cleanup(RateLimiter::new(), config, rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let config = CleanupConfig {
            interval: Duration::from_secs(3600),
            retention: Duration::from_secs(3600),
        };
        let handle = spawn_cleanup(RateLimiter::new(), config, rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task did not stop")
            .unwrap();
    }
}
