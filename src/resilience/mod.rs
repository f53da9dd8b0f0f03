//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! One attempt of an outbound call:
//!     → circuit_breaker.rs (allow? fail fast while open)
//!     → timeouts.rs (bound the exchange)
//!     → retries.rs (classify: success / retryable / terminal)
//!     → backoff.rs (wait before the next attempt)
//!     → circuit_breaker.rs (record the outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Only replayable requests are retried
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitState, StateObserver, StateTransition};
pub use retries::{AttemptFailure, AttemptOutcome};
