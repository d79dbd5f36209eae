use serde::Deserialize;
use std::time::Duration;

use crate::admission::AdmissionConfig;

/// Admission engine configuration
///
/// A single threshold and window apply to every key.
#[derive(Debug, Deserialize, Clone)]
pub struct LimiterConfig {
    /// Maximum occurrences of a key allowed inside one window.
    /// The report that reaches this count and every later one before expiry is blocked.
    /// Required, must be > 0
    #[serde(default)]
    pub threshold: u64,
    /// Trailing window in milliseconds after which a key's count is forgotten
    /// Required, must be > 0
    #[serde(default)]
    pub window_ms: u64,
    /// Number of sweep workers sharing the expiry timer
    /// Default: 3
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Sweep timer period in milliseconds
    /// Should be small relative to `window_ms` for expiry precision
    /// Default: 10
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            threshold: 0,
            window_ms: 0,
            workers: default_workers(),
            sweep_interval_ms: default_sweep_interval(),
        }
    }
}

impl LimiterConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl From<&LimiterConfig> for AdmissionConfig {
    fn from(cfg: &LimiterConfig) -> Self {
        AdmissionConfig {
            threshold: cfg.threshold,
            window: cfg.window(),
            workers: cfg.workers,
            sweep_interval: cfg.sweep_interval(),
        }
    }
}

fn default_workers() -> usize {
    3
}

fn default_sweep_interval() -> u64 {
    10
}
