//! Metrics collection and exposition.
//!
//! # Metrics
//! - `outbound_requests_total` (counter): calls by method, peer, result
//! - `outbound_request_duration_seconds` (histogram): call latency across all attempts
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open per peer
//! - `health_check_status` (gauge): 1=healthy, 0=unhealthy per checker
//! - `health_check_duration_seconds` (histogram): per-checker latency
//!
//! # Design Decisions
//! - The client talks to an injected [`TelemetryRecorder`], not to the facade
//! - Recording is never allowed to fail a call; errors are logged and dropped

use std::net::SocketAddr;
use std::time::Duration;

use http::{Method, StatusCode};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::resilience::CircuitState;

/// Result tag attached to a call sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResult {
    /// Rejected by the breaker without I/O.
    CircuitOpen,
    /// Terminal failure or retries exhausted.
    Error,
    /// A response was returned; tagged by status class.
    Status(StatusCode),
}

impl CallResult {
    pub fn label(self) -> &'static str {
        match self {
            CallResult::CircuitOpen => "circuit_open",
            CallResult::Error => "error",
            CallResult::Status(status) => match status.as_u16() / 100 {
                1 => "1xx",
                2 => "2xx",
                3 => "3xx",
                4 => "4xx",
                _ => "5xx",
            },
        }
    }
}

/// One sample per logical call.
#[derive(Debug, Clone)]
pub struct CallSample {
    pub method: Method,
    pub peer_service: String,
    pub result: CallResult,
    pub duration: Duration,
}

#[derive(Debug, Error)]
#[error("telemetry recording failed: {0}")]
pub struct TelemetryError(pub String);

/// Sink for per-call telemetry.
pub trait TelemetryRecorder: Send + Sync {
    fn record_call(&self, sample: &CallSample) -> Result<(), TelemetryError>;
}

/// Forwards samples to the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsRecorder;

impl TelemetryRecorder for MetricsRecorder {
    fn record_call(&self, sample: &CallSample) -> Result<(), TelemetryError> {
        let labels = [
            ("method", sample.method.to_string()),
            ("peer_service", sample.peer_service.clone()),
            ("result", sample.result.label().to_string()),
        ];

        counter!("outbound_requests_total", &labels).increment(1);
        histogram!("outbound_request_duration_seconds", &labels)
            .record(sample.duration.as_secs_f64());
        Ok(())
    }
}

/// Discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl TelemetryRecorder for NoopRecorder {
    fn record_call(&self, _sample: &CallSample) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Export the current breaker state for a peer.
pub fn record_breaker_state(peer_service: &str, state: CircuitState) {
    gauge!("circuit_breaker_state", "peer_service" => peer_service.to_string())
        .set(f64::from(state as u8));
}

/// Export the outcome of one health check.
pub fn record_health_check(checker: &str, healthy: bool, duration: Duration) {
    gauge!("health_check_status", "checker" => checker.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
    histogram!("health_check_duration_seconds", "checker" => checker.to_string())
        .record(duration.as_secs_f64());
}
