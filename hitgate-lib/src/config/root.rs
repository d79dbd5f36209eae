use serde::Deserialize;
use std::net::SocketAddr;

use super::limiter::LimiterConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port the report endpoint listens on
    /// Example: "0.0.0.0:8080" or "127.0.0.1:9000"
    /// Default: "0.0.0.0:8080"
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Admission engine configuration (threshold, window, sweep pool)
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    /// Controls the metrics and health check server
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            limiter: LimiterConfig::default(),
            timeout: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
