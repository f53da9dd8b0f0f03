//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// The downstream dependency the resilient client talks to.
    pub downstream: DownstreamConfig,

    /// Retry and backoff settings.
    pub retries: RetryConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health aggregation settings.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Downstream dependency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Peer service name, used in spans, metrics and as the checker name.
    pub name: String,

    /// Base URL every relative request path is joined onto.
    pub base_url: String,

    /// Path of the lightweight probe endpoint.
    pub probe_path: String,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Upper bound for a single attempt (send + response headers) in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            name: "downstream".to_string(),
            base_url: "http://127.0.0.1:3000".to_string(),
            probe_path: "/health".to_string(),
            connect_timeout_ms: 1_000,
            attempt_timeout_ms: 5_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call, including the first one.
    pub max_attempts: u32,

    /// Backoff before the first retry in milliseconds.
    pub initial_interval_ms: u64,

    /// Upper bound for any single backoff in milliseconds.
    pub max_interval_ms: u64,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Jitter fraction in `[0, 1)`.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 100,
            max_interval_ms: 2_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub max_failures: u32,

    /// How long the breaker stays open before allowing trial calls, in milliseconds.
    pub open_timeout_ms: u64,

    /// Maximum concurrent trial calls while half-open.
    pub half_open_limit: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            open_timeout_ms: 30_000,
            half_open_limit: 1,
        }
    }
}

/// Health aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the periodic health monitor.
    pub enabled: bool,

    /// Interval between aggregation rounds in seconds.
    pub interval_secs: u64,

    /// Deadline for a whole aggregation round in milliseconds.
    pub check_timeout_ms: u64,

    /// Additional TCP dependencies to probe.
    pub tcp: Vec<TcpCheckConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            check_timeout_ms: 2_000,
            tcp: Vec::new(),
        }
    }
}

/// A TCP-connect dependency check.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TcpCheckConfig {
    /// Unique checker name.
    pub name: String,

    /// Address to connect to (e.g., "127.0.0.1:5432").
    pub address: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
