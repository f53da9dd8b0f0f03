//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! caller (CallContext + OutboundRequest)
//!     → resilient.rs (breaker, attempt loop, telemetry)
//!     → request.rs (materialize one attempt)
//!     → context.rs (propagation headers, cancellation)
//!     → transport.rs (hyper connection pool)
//!     → downstream service
//! ```
//!
//! # Design Decisions
//! - One client per downstream dependency, shared behind an `Arc`
//! - Transport, auth and telemetry are injected through traits
//! - Per-call state travels in an explicit [`CallContext`]

pub mod context;
pub mod error;
pub mod request;
pub mod resilient;
pub mod transport;

pub use context::{CallContext, ContextError, X_CORRELATION_ID, X_REQUEST_ID};
pub use error::ClientError;
pub use request::{OutboundRequest, RequestBody};
pub use resilient::{logging_observer, AuthHook, ResilientClient, ResilientClientBuilder};
pub use transport::{
    empty_body, full_body, Body, BoxError, HyperTransport, Transport, TransportError,
};
