#![forbid(unsafe_code)]

pub mod admission;
pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;

pub use admission::{AdmissionConfig, AdmissionService, Fingerprint};
pub use config::{load_from_path, Config};
pub use error::{GateError, Result};
pub use server::{ReportHandler, ReportRequest, ReportResponse};
