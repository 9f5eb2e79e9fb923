use serde::Serialize;
use std::collections::BTreeMap;
use std::num::{NonZeroU32, NonZeroU64};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Window length and request budget for one class of endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    window_ms: NonZeroU64,
    max: NonZeroU32,
}

impl RateLimitOptions {
    // 5 per 15 minutes
    pub const AUTH: Self = Self::preset(15 * 60 * 1000, 5);
    // 5 per minute
    pub const FORMS: Self = Self::preset(60 * 1000, 5);
    // 60 per minute
    pub const API: Self = Self::preset(60 * 1000, 60);
    // 120 per minute
    pub const READ: Self = Self::preset(60 * 1000, 120);
    // 10 per hour
    pub const EXPENSIVE: Self = Self::preset(60 * 60 * 1000, 10);

    pub fn new(window_ms: u64, max: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            window_ms: NonZeroU64::new(window_ms).ok_or(ConfigError::ZeroWindow)?,
            max: NonZeroU32::new(max).ok_or(ConfigError::ZeroMax)?,
        })
    }

    // zero values fail the build rather than a request
    const fn preset(window_ms: u64, max: u32) -> Self {
        let window_ms = match NonZeroU64::new(window_ms) {
            Some(v) => v,
            None => panic!("preset window must be non-zero"),
        };
        let max = match NonZeroU32::new(max) {
            Some(v) => v,
            None => panic!("preset max must be non-zero"),
        };
        Self { window_ms, max }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms.get()
    }

    // saturates at i64::MAX
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.window_ms.get()).unwrap_or(i64::MAX)
    }

    pub fn max(&self) -> u32 {
        self.max.get()
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.get())
    }
}

pub const PRESETS: [(&str, RateLimitOptions); 5] = [
    ("auth", RateLimitOptions::AUTH),
    ("forms", RateLimitOptions::FORMS),
    ("api", RateLimitOptions::API),
    ("read", RateLimitOptions::READ),
    ("expensive", RateLimitOptions::EXPENSIVE),
];

/// A `name=window_ms:max` policy definition, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    pub name: String,
    pub options: RateLimitOptions,
}

impl FromStr for PolicySpec {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidPolicySpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (name, limits) = spec.split_once('=').ok_or_else(|| invalid("missing '='"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("empty policy name"));
        }

        let (window_ms, max) = limits
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' between window_ms and max"))?;
        let window_ms: u64 = window_ms
            .trim()
            .parse()
            .map_err(|_| invalid("window_ms is not an integer"))?;
        let max: u32 = max
            .trim()
            .parse()
            .map_err(|_| invalid("max is not an integer"))?;

        let options =
            RateLimitOptions::new(window_ms, max).map_err(|source| ConfigError::InvalidPolicy {
                name: name.to_string(),
                source: Box::new(source),
            })?;

        Ok(Self {
            name: name.to_string(),
            options,
        })
    }
}

/// Named policies consulted by call sites.
///
/// New endpoint classes get a new entry here; the limiter itself never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PolicyTable {
    policies: BTreeMap<String, RateLimitOptions>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::presets()
    }
}

impl PolicyTable {
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    pub fn presets() -> Self {
        let mut table = Self::empty();
        for (name, options) in PRESETS {
            table.insert(name, options);
        }
        table
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        options: RateLimitOptions,
    ) -> Option<RateLimitOptions> {
        self.policies.insert(name.into(), options)
    }

    pub fn with_overrides<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = PolicySpec>,
    {
        for spec in specs {
            self.insert(spec.name, spec.options);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<RateLimitOptions> {
        self.policies.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, RateLimitOptions)> {
        self.policies.iter().map(|(name, options)| (name.as_str(), *options))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn largest_window(&self) -> Option<Duration> {
        self.policies.values().map(|options| options.window()).max()
    }
}
