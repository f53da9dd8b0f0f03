//! Errors surfaced to callers of the resilient client.

use thiserror::Error;

use crate::client::context::ContextError;
use crate::client::transport::BoxError;
use crate::resilience::AttemptFailure;

/// Error returned by [`crate::client::ResilientClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected by the circuit breaker before any network attempt.
    #[error("circuit open for `{peer}`")]
    CircuitOpen { peer: String },

    /// The last attempt's cause once no further attempt was possible.
    #[error("retries exhausted after {attempts} attempt(s): {cause}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        cause: AttemptFailure,
    },

    /// The caller's context was canceled.
    #[error("request canceled")]
    Canceled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The authentication hook refused to decorate the request.
    #[error("authorization hook failed: {0}")]
    Authorization(#[source] BoxError),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Wrap a terminal attempt failure. Context causes are returned as-is.
    pub(crate) fn terminal(attempts: u32, cause: AttemptFailure) -> Self {
        match cause {
            AttemptFailure::Canceled => ClientError::Canceled,
            AttemptFailure::DeadlineExceeded => ClientError::DeadlineExceeded,
            cause => ClientError::RetriesExhausted { attempts, cause },
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ClientError::CircuitOpen { .. })
    }

    /// True when the caller's own context ended the call.
    pub fn is_context(&self) -> bool {
        matches!(self, ClientError::Canceled | ClientError::DeadlineExceeded)
    }
}

impl From<ContextError> for ClientError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => ClientError::Canceled,
            ContextError::DeadlineExceeded => ClientError::DeadlineExceeded,
        }
    }
}

impl From<ContextError> for AttemptFailure {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => AttemptFailure::Canceled,
            ContextError::DeadlineExceeded => AttemptFailure::DeadlineExceeded,
        }
    }
}
