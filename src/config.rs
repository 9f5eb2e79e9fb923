use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::{CleanupConfig, PolicySpec, PolicyTable};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "rate-gate")]
#[command(about = "Sliding-window rate limiting service")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "RATE_GATE_PORT", default_value_t = 8080)]
    pub port: u16,

    // Interface to bind
    #[arg(long, env = "RATE_GATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Extra or overriding policies, name=window_ms:max
    // Example: --policy uploads=30000:3 --policy auth=600000:10
    #[arg(long = "policy", env = "RATE_GATE_POLICIES", value_delimiter = ',')]
    pub policies: Vec<PolicySpec>,

    // Seconds between cleanup sweeps
    #[arg(long, env = "RATE_GATE_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,

    // Minimum history the sweeper keeps; defaults to the largest policy window
    #[arg(long, env = "RATE_GATE_CLEANUP_RETENTION_SECS")]
    pub cleanup_retention_secs: Option<u64>,
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn policy_table(&self) -> PolicyTable {
        PolicyTable::presets().with_overrides(self.policies.iter().cloned())
    }

    pub fn cleanup_config(&self, policies: &PolicyTable) -> Result<CleanupConfig, ConfigError> {
        CleanupConfig::for_policies(
            policies,
            Duration::from_secs(self.cleanup_interval_secs),
            self.cleanup_retention_secs.map(Duration::from_secs),
        )
    }
}
