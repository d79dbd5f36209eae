use serde::Deserialize;
use std::time::Duration;

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Per-request deadline for the report endpoint in milliseconds
    /// Requests exceeding it are answered with 503
    /// Default: 2000 (2 seconds)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,
    /// Graceful shutdown timeout in seconds
    /// How long in-flight connections may keep running after a shutdown signal
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: default_request_timeout(), shutdown_secs: default_shutdown_timeout() }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

fn default_request_timeout() -> u64 {
    2000
}

fn default_shutdown_timeout() -> u64 {
    30
}
