//! HTTP transport around the admission engine.
//!
//! A single endpoint, `POST /report`, takes `{"url": "..."}` and answers
//! `{"block": true|false}`.

pub mod handler;
pub mod listener;

pub use handler::{ReportHandler, ReportRequest, ReportResponse, REPORT_PATH};
pub use listener::{run, serve};
