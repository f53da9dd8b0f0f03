//! Downstream transport abstraction.
//!
//! # Responsibilities
//! - Define the "send request, get response-or-error" seam the client drives
//! - Provide the default hyper-based HTTP implementation
//! - Map low-level client errors onto timeout / connection / other
//!
//! # Design Decisions
//! - Transport does not retry, time out, or classify statuses; the client does
//! - Bodies are boxed so scripted transports and hyper share one type

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

/// Boxed error used by bodies and wrapped transport errors.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Request and response body type.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// An empty body.
pub fn empty_body() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// A fully buffered body.
pub fn full_body(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network timeout")]
    Timeout,
    #[error("connection error: {0}")]
    Connection(#[source] BoxError),
    #[error("transport error: {0}")]
    Other(#[source] BoxError),
}

/// Sends one request and returns the downstream's response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

/// HTTP/1.1 and HTTP/2 transport backed by hyper's pooled client.
#[derive(Clone, Debug)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    /// Create a transport whose TCP connects give up after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(TransportError::from_client_error)?;

        Ok(response.map(|body| body.map_err(BoxError::from).boxed_unsync()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Timeout,
    Connection,
}

impl TransportError {
    /// Map a hyper client error by inspecting its source chain.
    pub fn from_client_error(err: hyper_util::client::legacy::Error) -> Self {
        let cause = if err.is_connect() {
            // Connect failures include the connector's own timeout.
            Some(connect_cause(&err).unwrap_or(Cause::Connection))
        } else {
            connect_cause(&err)
        };

        match cause {
            Some(Cause::Timeout) => TransportError::Timeout,
            Some(Cause::Connection) => TransportError::Connection(Box::new(err)),
            None => TransportError::Other(Box::new(err)),
        }
    }
}

fn connect_cause(err: &(dyn StdError + 'static)) -> Option<Cause> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut => return Some(Cause::Timeout),
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => return Some(Cause::Connection),
                _ => {}
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_timeout() {
                return Some(Cause::Timeout);
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() {
                return Some(Cause::Connection);
            }
        }
        source = cause.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[tokio::test]
    async fn refused_connection_maps_to_connection_error() {
        // Bind then drop to get a port with nothing listening.
        let addr: SocketAddr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let transport = HyperTransport::default();
        let request = Request::get(format!("http://{addr}/"))
            .body(empty_body())
            .unwrap();

        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn body_helpers_round_trip() {
        let collected = full_body("payload").collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"payload"));

        let empty = empty_body().collect().await.unwrap().to_bytes();
        assert!(empty.is_empty());
    }
}
