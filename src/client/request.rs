//! Outbound request representation.
//!
//! # Responsibilities
//! - Describe one logical request: method, target, headers, body
//! - Decide at construction time how many attempts the request may use
//! - Materialize a fresh `http::Request` for every attempt
//!
//! # Design Decisions
//! - Retrying a request requires a replayable body. `Empty` and `Buffered`
//!   bodies are replayed byte-for-byte; a `Streaming` body is consumed by the
//!   first attempt, so such a request is limited to exactly one attempt
//! - Callers issuing non-idempotent calls can cap attempts explicitly

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Uri};

use crate::client::transport::{empty_body, full_body, Body};

/// Body of an outbound request.
pub enum RequestBody {
    Empty,
    /// Fully buffered; cheap to clone and safe to replay.
    Buffered(Bytes),
    /// Single-use stream. `None` once the only attempt has taken it.
    Streaming(Option<Body>),
}

impl RequestBody {
    pub fn is_replayable(&self) -> bool {
        !matches!(self, RequestBody::Streaming(_))
    }

    fn take_for_attempt(&mut self) -> Option<Body> {
        match self {
            RequestBody::Empty => Some(empty_body()),
            RequestBody::Buffered(bytes) => Some(full_body(bytes.clone())),
            RequestBody::Streaming(body) => body.take(),
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            RequestBody::Streaming(Some(_)) => f.write_str("Streaming"),
            RequestBody::Streaming(None) => f.write_str("Streaming(consumed)"),
        }
    }
}

/// One logical outbound request.
#[derive(Debug)]
pub struct OutboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: RequestBody,
    max_attempts: Option<u32>,
}

impl OutboundRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            max_attempts: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a buffered, replayable body.
    pub fn body(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Buffered(bytes.into());
        self
    }

    /// Attach a single-use streaming body. The request gets exactly one attempt.
    pub fn streaming_body(mut self, body: Body) -> Self {
        self.body = RequestBody::Streaming(Some(body));
        self
    }

    /// Cap attempts for this request below the client's policy.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Attempts this request can safely use, given a policy maximum.
    pub fn attempt_budget(&self, policy_max: u32) -> u32 {
        let replay_limit = if self.body.is_replayable() { policy_max } else { 1 };
        let budget = match self.max_attempts {
            Some(cap) => replay_limit.min(cap),
            None => replay_limit,
        };
        budget.max(1)
    }

    /// Build the `http::Request` for the next attempt.
    ///
    /// Returns `None` when a streaming body was already consumed, which the
    /// attempt budget rules out.
    pub(crate) fn to_attempt(&mut self) -> Option<Request<Body>> {
        let body = self.body.take_for_attempt()?;
        let mut request = Request::new(body);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        Some(request)
    }
}
