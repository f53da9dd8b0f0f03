//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use outbound_guard::client::ResilientClient;
use outbound_guard::observability::NoopRecorder;
use outbound_guard::resilience::{CircuitBreaker, RetryPolicy};

/// What the mock backend sends back for one request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown")
                .to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct Seen {
    /// Zero-based index of this request across the backend's lifetime.
    pub index: u32,
    /// Request line plus headers, as received.
    pub head: String,
}

impl Seen {
    pub fn path(&self) -> &str {
        self.head.split_whitespace().nth(1).unwrap_or("/")
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct Backend {
    pub addr: SocketAddr,
    calls: Arc<AtomicU32>,
}

impl Backend {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }
}

/// Start a programmable mock backend on an ephemeral port.
///
/// Every connection serves one request and is closed afterwards.
pub async fn start_programmable_backend<F, Fut>(f: F) -> Backend
where
    F: Fn(Seen) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let f = Arc::new(f);

    let counter = calls.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        serve_one(socket, f.as_ref(), &counter).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    Backend { addr, calls }
}

/// Start a mock backend that always answers with `status`.
pub async fn start_mock_backend(status: u16) -> Backend {
    start_programmable_backend(move |_| async move { Reply::status(status) }).await
}

/// A local address with nothing listening on it.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn serve_one<F, Fut>(mut socket: TcpStream, f: &F, calls: &AtomicU32)
where
    F: Fn(Seen) -> Fut,
    Fut: Future<Output = Reply>,
{
    let Some(head) = read_head(&mut socket).await else {
        return;
    };
    let index = calls.fetch_add(1, Ordering::SeqCst);
    let reply = f(Seen { index, head }).await;
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let reason = StatusCode::from_u16(reply.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason,
        reply.body.len(),
        reply.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf[..end]).into_owned());
        }
    }
}

/// Retry policy with short, deterministic waits.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_interval: Duration::from_millis(20),
        max_interval: Duration::from_millis(100),
        multiplier: 2.0,
        jitter: 0.0,
    }
}

/// Client for `base` with fast retries and no metrics.
pub fn client_for(base: Url, max_attempts: u32, max_failures: u32) -> ResilientClient {
    ResilientClient::builder("inventory", base)
        .retry_policy(fast_policy(max_attempts))
        .circuit_breaker(CircuitBreaker::new(max_failures, Duration::from_secs(30), 1))
        .attempt_timeout(Duration::from_secs(2))
        .telemetry(NoopRecorder)
        .build()
}
