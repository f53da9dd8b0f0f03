//! Health aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! Checkers (checks.rs):
//!     TCP connect, async closures, resilient client probes
//!     → registered by unique name in registry.rs
//!
//! Registry round (registry.rs):
//!     Snapshot checkers → one task per checker → join all
//!     → reduce to Healthy / Unhealthy
//!
//! Monitor (monitor.rs):
//!     Periodic timer → registry round → watch channel
//! ```
//!
//! # Design Decisions
//! - Checkers are independent; a slow one only delays its own slot
//! - Every round is bounded by the caller's context, not by the registry
//! - Results are immutable values, one per round

pub mod checks;
pub mod monitor;
pub mod registry;

pub use checks::{ClientProbe, FnCheck, TcpCheck};
pub use monitor::HealthMonitor;
pub use registry::{
    CheckResult, HealthCheck, HealthRegistry, HealthResult, HealthStatus, RegistryError,
};
