//! Attempt outcome classification.
//!
//! # Rules
//! - Caller cancellation / deadline: terminal, never retried
//! - Network timeout or connection-level error (refused, reset, closed): retryable
//! - Any other transport error: terminal
//! - Response with status >= 500: retryable
//! - Any other status (including 4xx): success at this layer
//!
//! # Design Decisions
//! - Classification is method-agnostic; replay safety is decided by the
//!   request body (see `client::request`), not by the HTTP verb

use http::StatusCode;
use thiserror::Error;

use crate::client::transport::TransportError;

/// Why a single attempt did not produce a usable response.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("downstream returned {0}")]
    ServerError(StatusCode),
    #[error("request canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl AttemptFailure {
    /// True for failures that originate from the caller's context.
    pub fn is_context(&self) -> bool {
        matches!(self, AttemptFailure::Canceled | AttemptFailure::DeadlineExceeded)
    }
}

/// Tagged result of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome<R> {
    Success(R),
    Retryable(AttemptFailure),
    Terminal(AttemptFailure),
}

/// Whether a response status is worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
}

/// Classify a transport-level error.
pub fn classify_transport_error<R>(err: TransportError) -> AttemptOutcome<R> {
    match err {
        TransportError::Timeout | TransportError::Connection(_) => {
            AttemptOutcome::Retryable(AttemptFailure::Transport(err))
        }
        TransportError::Other(_) => AttemptOutcome::Terminal(AttemptFailure::Transport(err)),
    }
}

/// Classify a completed exchange by status alone.
///
/// A retryable status hands the response back in `Err` so the caller can
/// drain its body before retrying.
pub fn classify_status<R>(status: StatusCode, response: R) -> Result<AttemptOutcome<R>, R> {
    if is_retryable_status(status) {
        Err(response)
    } else {
        Ok(AttemptOutcome::Success(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        for code in [500, 502, 503, 504, 599] {
            assert!(is_retryable_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }

    #[test]
    fn client_errors_and_redirects_are_success() {
        for code in [200, 201, 204, 301, 400, 404, 409, 429] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(classify_status(status, ()), Ok(AttemptOutcome::Success(()))));
        }
    }

    #[test]
    fn transport_errors_split_on_connection_level() {
        let timeout: AttemptOutcome<()> = classify_transport_error(TransportError::Timeout);
        assert!(matches!(timeout, AttemptOutcome::Retryable(AttemptFailure::Transport(_))));

        let refused: AttemptOutcome<()> = classify_transport_error(TransportError::Connection(
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into(),
        ));
        assert!(matches!(refused, AttemptOutcome::Retryable(AttemptFailure::Transport(_))));

        let other: AttemptOutcome<()> =
            classify_transport_error(TransportError::Other("invalid header".into()));
        assert!(matches!(other, AttemptOutcome::Terminal(AttemptFailure::Transport(_))));
    }

    #[test]
    fn context_failures_are_flagged() {
        assert!(AttemptFailure::Canceled.is_context());
        assert!(AttemptFailure::DeadlineExceeded.is_context());
        assert!(!AttemptFailure::ServerError(StatusCode::BAD_GATEWAY).is_context());
    }
}
