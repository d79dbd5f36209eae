use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::error::{GateError, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured levels.
pub fn init_tracing(log_level: &str, show_target: bool, otel_log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{log_level},opentelemetry={otel_log_level}"))
    });
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(show_target);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| GateError::Telemetry(format!("Failed to set global tracing subscriber: {e}")))?;

    Ok(())
}
