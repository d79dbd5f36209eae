use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

use crate::error::{GateError, Result};

pub mod labels {
    pub const DECISION: &str = "decision";
    pub const STATUS_CODE: &str = "status_code";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const DECISION_ALLOWED: &str = "allowed";
    pub const DECISION_BLOCKED: &str = "blocked";
}

#[derive(Clone)]
pub struct Metrics {
    // Admission decisions
    pub admission_requests_total: Counter<u64>,
    pub admission_duration_seconds: Histogram<f64>,

    // Expiry bookkeeping
    pub expiry_scheduled_total: Counter<u64>,
    pub evictions_total: Counter<u64>,
    pub sweep_passes_total: Counter<u64>,

    // Transport
    pub http_requests_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            admission_requests_total: meter
                .u64_counter("hitgate_admission_requests_total")
                .with_description("Total number of admission decisions, by decision")
                .build(),
            admission_duration_seconds: meter
                .f64_histogram("hitgate_admission_duration_seconds")
                .with_description("Time spent computing an admission decision in seconds")
                .build(),

            expiry_scheduled_total: meter
                .u64_counter("hitgate_expiry_scheduled_total")
                .with_description("Total number of first occurrences scheduled for expiry")
                .build(),
            evictions_total: meter
                .u64_counter("hitgate_evictions_total")
                .with_description("Total number of keys forgotten after their window elapsed")
                .build(),
            sweep_passes_total: meter
                .u64_counter("hitgate_sweep_passes_total")
                .with_description("Total number of sweep passes run by the worker pool")
                .build(),

            http_requests_total: meter
                .u64_counter("hitgate_http_requests_total")
                .with_description("Total number of report requests served, by status code")
                .build(),

            build_info: meter
                .u64_gauge("hitgate_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_admission(&self, blocked: bool, duration: f64) {
        let decision = if blocked { values::DECISION_BLOCKED } else { values::DECISION_ALLOWED };
        let attrs = &[KeyValue::new(labels::DECISION, decision)];
        self.admission_requests_total.add(1, attrs);
        self.admission_duration_seconds.record(duration, attrs);
    }

    pub fn record_expiry_scheduled(&self) {
        self.expiry_scheduled_total.add(1, &[]);
    }

    pub fn record_sweep_pass(&self, evicted: usize) {
        self.sweep_passes_total.add(1, &[]);
        if evicted > 0 {
            self.evictions_total.add(evicted as u64, &[]);
        }
    }

    pub fn record_http_request(&self, status_code: u16) {
        self.http_requests_total
            .add(1, &[KeyValue::new(labels::STATUS_CODE, status_code.to_string())]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry)> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| GateError::Telemetry(format!("Failed to build prometheus exporter: {e}")))?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("hitgate");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
