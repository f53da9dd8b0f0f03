//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resilient client and health registry produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (one span per outbound call)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request and correlation IDs flow into outbound headers and spans
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::metrics::{
    CallResult, CallSample, MetricsRecorder, NoopRecorder, TelemetryError, TelemetryRecorder,
};
