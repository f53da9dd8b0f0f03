//! Per-attempt timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry,
//!   which aborts the in-flight exchange
//! - Timeout errors are distinct from other transport errors (and retryable)

use std::future::Future;
use std::time::Duration;

use crate::client::transport::TransportError;

/// Bound a single transport exchange by `limit`.
pub async fn with_attempt_timeout<F, T>(limit: Duration, exchange: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, exchange).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}
