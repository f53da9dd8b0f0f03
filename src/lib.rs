//! Outbound Guard Library
//!
//! A resilient outbound HTTP client (circuit breaker, retries with jittered
//! backoff, per-attempt timeouts, per-call telemetry) and a concurrent
//! health registry for the dependencies a service talks to.

// Outbound calls
pub mod client;
pub mod resilience;

// Dependency health
pub mod health;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use client::{CallContext, ClientError, OutboundRequest, ResilientClient};
pub use config::GuardConfig;
pub use health::{HealthCheck, HealthRegistry, HealthResult, HealthStatus};
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitState, RetryPolicy};
