//! The `/report` endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{combinators::BoxBody, BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::admission::AdmissionService;
use crate::error::{GateError, Result};
use crate::telemetry::Metrics;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

pub const REPORT_PATH: &str = "/report";

/// Largest request body accepted by the report endpoint.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Body of `POST /report`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportRequest {
    pub url: String,
}

/// Answer of `POST /report`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportResponse {
    pub block: bool,
}

/// Shared state of the report endpoint.
#[derive(Clone)]
pub struct ReportHandler {
    service: Arc<AdmissionService<str>>,
    request_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl ReportHandler {
    pub fn new(
        service: Arc<AdmissionService<str>>,
        request_timeout: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { service, request_timeout, metrics }
    }

    /// Route a request, bounded by the request deadline.
    pub async fn call(&self, req: Request<Incoming>) -> Response<RespBody> {
        let resp = match tokio::time::timeout(self.request_timeout, self.dispatch(req)).await {
            Ok(resp) => resp,
            Err(_) => {
                warn!(timeout_ms = self.request_timeout.as_millis() as u64, "report request timed out");
                text_response(StatusCode::SERVICE_UNAVAILABLE, "Request timed out".to_string())
            }
        };

        if let Some(m) = &self.metrics {
            m.record_http_request(resp.status().as_u16());
        }
        resp
    }

    async fn dispatch(&self, req: Request<Incoming>) -> Response<RespBody> {
        if req.uri().path() != REPORT_PATH {
            return text_response(StatusCode::NOT_FOUND, "Not Found".to_string());
        }
        if req.method() != Method::POST {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string());
        }

        let input = match read_report(req).await {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "Error occurred trying to parse the request");
                return text_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        let output = self.report(&input);

        match json_response(&output) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Error occurred trying to encode the response");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    /// The admission decision, with request logging around it.
    pub fn report(&self, input: &ReportRequest) -> ReportResponse {
        let start = Instant::now();
        debug!(url = %input.url, "received report");

        let output = ReportResponse { block: self.service.handle(&input.url) };

        debug!(
            url = %input.url,
            block = output.block,
            elapsed = ?start.elapsed(),
            "report processed"
        );
        output
    }
}

async fn read_report(req: Request<Incoming>) -> Result<ReportRequest> {
    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| GateError::Http(format!("Failed to read request body: {e}")))?
        .to_bytes();

    Ok(serde_json::from_slice(&body)?)
}

fn json_response(value: &ReportResponse) -> Result<Response<RespBody>> {
    let body = Full::new(Bytes::from(serde_json::to_vec(value)?))
        .map_err(|never| match never {})
        .boxed();

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(body)
        .map_err(|e| GateError::Http(format!("Failed to build response: {e}")))
}

fn text_response(status: StatusCode, text: String) -> Response<RespBody> {
    let body = Full::new(Bytes::from(text))
        .map_err(|never| match never {})
        .boxed();
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp
}
