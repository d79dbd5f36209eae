use std::fs;
use std::path::Path;

use tracing::warn;

use crate::config::Config;
use crate::error::{GateError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| GateError::Config(format!("Failed to parse config: {e}")))?;

    validate(&cfg)?;

    Ok(cfg)
}

/// Check the values the admission engine assumes are valid.
///
/// Called by `load_from_path`, and again by the binary after command line
/// overrides are applied.
pub fn validate(cfg: &Config) -> Result<()> {
    let limiter = &cfg.limiter;
    if limiter.threshold == 0 {
        return Err(GateError::Config("limiter.threshold must be > 0".into()));
    }
    if limiter.window_ms == 0 {
        return Err(GateError::Config("limiter.window_ms must be > 0".into()));
    }
    if limiter.workers == 0 {
        return Err(GateError::Config("limiter.workers must be > 0".into()));
    }
    if limiter.sweep_interval_ms == 0 {
        return Err(GateError::Config("limiter.sweep_interval_ms must be > 0".into()));
    }
    if cfg.timeout.request_ms == 0 {
        return Err(GateError::Config("timeout.request_ms must be > 0".into()));
    }

    if limiter.sweep_interval_ms >= limiter.window_ms {
        warn!(
            sweep_interval_ms = limiter.sweep_interval_ms,
            window_ms = limiter.window_ms,
            "sweep interval is not smaller than the window, expiry will be imprecise"
        );
    }

    Ok(())
}
