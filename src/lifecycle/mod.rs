//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Root token cancelled → child tokens of every task cancelled
//!     → in-flight calls and health rounds end with Canceled
//! ```
//!
//! # Design Decisions
//! - One root cancellation token; tasks only ever see child tokens
//! - Shutdown has timeout: tasks still running after the grace period are abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
