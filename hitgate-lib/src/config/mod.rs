mod limiter;
mod loader;
mod root;
mod telemetry;
mod timeout;

pub use limiter::LimiterConfig;
pub use loader::{load_from_path, validate};
pub use root::Config;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
