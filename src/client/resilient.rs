//! The resilient client.
//!
//! # Per-call Flow
//! ```text
//! execute(ctx, request)
//!     → breaker.allow()            (reject: CircuitOpen, no I/O)
//!     → span "outbound_request"
//!     → attempt loop:
//!         backoff wait (cancellable), breaker.allow()   [attempts after the first]
//!         propagation headers + auth hook
//!         transport.send()  bounded by attempt timeout and ctx
//!         classify → success / retryable / terminal
//!     → breaker outcome, span status, one telemetry sample
//! ```
//!
//! # Design Decisions
//! - The breaker is consulted before and informed after every attempt; its
//!   lock is never held across I/O
//! - Caller cancellation is terminal and returned verbatim
//! - A call whose future is dropped still returns its breaker permit and
//!   emits its telemetry sample
//! - Responses with retryable statuses are drained before the next attempt so
//!   the connection can go back to the pool

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HeaderMap;
use http::{Method, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use tokio::time::Instant;
use tracing::{Instrument, Span};
use url::Url;

use crate::client::context::CallContext;
use crate::client::error::ClientError;
use crate::client::request::OutboundRequest;
use crate::client::transport::{Body, BoxError, HyperTransport, Transport};
use crate::config::GuardConfig;
use crate::observability::metrics::{
    self, CallResult, CallSample, MetricsRecorder, TelemetryRecorder,
};
use crate::observability::tracing as spans;
use crate::resilience::retries::{classify_status, classify_transport_error};
use crate::resilience::timeouts::with_attempt_timeout;
use crate::resilience::{
    AttemptFailure, AttemptOutcome, CircuitBreaker, CircuitState, RetryPolicy, StateObserver,
    StateTransition,
};

/// Decorates every attempt with credentials.
///
/// Invoked before each attempt, not only the first, so a refreshed credential
/// is picked up by retries.
#[async_trait]
pub trait AuthHook: Send + Sync {
    async fn authorize(&self, headers: &mut HeaderMap) -> Result<(), BoxError>;
}

/// Client for one downstream dependency.
pub struct ResilientClient {
    peer_service: String,
    base_url: Url,
    probe_path: String,
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    auth: Option<Arc<dyn AuthHook>>,
    telemetry: Arc<dyn TelemetryRecorder>,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("peer_service", &self.peer_service)
            .field("base_url", &self.base_url.as_str())
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    pub fn builder(peer_service: impl Into<String>, base_url: Url) -> ResilientClientBuilder {
        ResilientClientBuilder::new(peer_service.into(), base_url)
    }

    /// Build a client from validated configuration, using the hyper transport
    /// and the `metrics` facade.
    pub fn from_config(config: &GuardConfig) -> Result<Self, ClientError> {
        let downstream = &config.downstream;
        let base_url = Url::parse(&downstream.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("base_url: {e}")))?;

        let client = Self::builder(downstream.name.clone(), base_url)
            .transport(HyperTransport::new(Duration::from_millis(
                downstream.connect_timeout_ms,
            )))
            .retry_policy(RetryPolicy::from(&config.retries))
            .circuit_breaker(CircuitBreaker::from_config(&config.circuit_breaker))
            .attempt_timeout(Duration::from_millis(downstream.attempt_timeout_ms))
            .probe_path(downstream.probe_path.clone())
            .telemetry(MetricsRecorder)
            .build();
        Ok(client)
    }

    pub fn peer_service(&self) -> &str {
        &self.peer_service
    }

    pub fn probe_path(&self) -> &str {
        &self.probe_path
    }

    /// Current breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Start a request to `path`, resolved against the base URL.
    pub fn request(&self, method: Method, path: &str) -> Result<OutboundRequest, ClientError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidRequest(format!("{path}: {e}")))?;
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| ClientError::InvalidRequest(format!("{url}: {e}")))?;
        Ok(OutboundRequest::new(method, uri))
    }

    pub async fn get(&self, ctx: &CallContext, path: &str) -> Result<Response<Body>, ClientError> {
        let request = self.request(Method::GET, path)?;
        self.execute(ctx, request).await
    }

    pub async fn head(&self, ctx: &CallContext, path: &str) -> Result<Response<Body>, ClientError> {
        let request = self.request(Method::HEAD, path)?;
        self.execute(ctx, request).await
    }

    pub async fn delete(
        &self,
        ctx: &CallContext,
        path: &str,
    ) -> Result<Response<Body>, ClientError> {
        let request = self.request(Method::DELETE, path)?;
        self.execute(ctx, request).await
    }

    pub async fn post(
        &self,
        ctx: &CallContext,
        path: &str,
        body: impl Into<Bytes>,
    ) -> Result<Response<Body>, ClientError> {
        let request = self.request(Method::POST, path)?.body(body);
        self.execute(ctx, request).await
    }

    pub async fn put(
        &self,
        ctx: &CallContext,
        path: &str,
        body: impl Into<Bytes>,
    ) -> Result<Response<Body>, ClientError> {
        let request = self.request(Method::PUT, path)?.body(body);
        self.execute(ctx, request).await
    }

    pub async fn patch(
        &self,
        ctx: &CallContext,
        path: &str,
        body: impl Into<Bytes>,
    ) -> Result<Response<Body>, ClientError> {
        let request = self.request(Method::PATCH, path)?.body(body);
        self.execute(ctx, request).await
    }

    /// Lightweight single-attempt call to the probe endpoint.
    pub async fn probe(&self, ctx: &CallContext) -> Result<StatusCode, ClientError> {
        let request = self
            .request(Method::GET, &self.probe_path)?
            .with_max_attempts(1);
        let response = self.execute(ctx, request).await?;
        Ok(response.status())
    }

    /// Issue one logical request.
    ///
    /// Retries only apply to replayable bodies; see [`OutboundRequest`].
    /// Dropping the returned future counts as a failed call: the breaker is
    /// informed and one `error` sample is recorded.
    pub async fn execute(
        &self,
        ctx: &CallContext,
        request: OutboundRequest,
    ) -> Result<Response<Body>, ClientError> {
        let method = request.method().clone();

        if !self.breaker.allow() {
            tracing::debug!(peer = %self.peer_service, %method, "circuit open, failing fast");
            self.record(&method, CallResult::CircuitOpen, Duration::ZERO);
            return Err(self.circuit_open());
        }

        let span = spans::outbound_span(&method, request.uri(), &self.peer_service);
        let mut call = InFlight::new(self, method, span.clone());
        let result = self.run_attempts(ctx, request, &mut call).instrument(span).await;
        call.finish(&result);
        result
    }

    /// The attempt loop. The first `allow()` has already been granted.
    async fn run_attempts(
        &self,
        ctx: &CallContext,
        mut request: OutboundRequest,
        call: &mut InFlight<'_>,
    ) -> Result<Response<Body>, ClientError> {
        let budget = request.attempt_budget(self.policy.max_attempts);
        if budget < self.policy.max_attempts {
            tracing::debug!(
                budget,
                policy = self.policy.max_attempts,
                "attempts capped for request"
            );
        }

        loop {
            if call.attempts > 0 {
                let delay = self.policy.backoff(call.attempts - 1);
                tracing::debug!(
                    attempt = call.attempts + 1,
                    delay = ?delay,
                    "backing off before retry"
                );
                if let Err(err) = ctx.sleep(delay).await {
                    self.breaker.record_failure();
                    return Err(err.into());
                }
                if !call.allow() {
                    tracing::debug!(
                        attempt = call.attempts + 1,
                        "circuit opened between attempts"
                    );
                    return Err(self.circuit_open());
                }
            }

            let Some(mut http_request) = request.to_attempt() else {
                call.failure();
                let reason = "request body already consumed".to_string();
                return Err(ClientError::InvalidRequest(reason));
            };
            ctx.inject(http_request.headers_mut());
            if let Some(auth) = &self.auth {
                if let Err(err) = auth.authorize(http_request.headers_mut()).await {
                    call.failure();
                    return Err(ClientError::Authorization(err));
                }
            }

            call.attempts += 1;
            let attempts = call.attempts;
            match self.attempt(ctx, http_request).await {
                AttemptOutcome::Success(response) => {
                    call.success();
                    return Ok(response);
                }
                AttemptOutcome::Retryable(cause) => {
                    call.failure();
                    if attempts >= budget {
                        tracing::warn!(attempts, error = %cause, "retries exhausted");
                        return Err(ClientError::terminal(attempts, cause));
                    }
                    tracing::warn!(
                        attempt = attempts,
                        max_attempts = budget,
                        error = %cause,
                        "retryable failure"
                    );
                }
                AttemptOutcome::Terminal(cause) => {
                    call.failure();
                    tracing::warn!(attempt = attempts, error = %cause, "terminal failure");
                    return Err(ClientError::terminal(attempts, cause));
                }
            }
        }
    }

    /// One exchange, bounded by the attempt timeout and the caller's context.
    async fn attempt(
        &self,
        ctx: &CallContext,
        request: http::Request<Body>,
    ) -> AttemptOutcome<Response<Body>> {
        let exchange = with_attempt_timeout(self.attempt_timeout, self.transport.send(request));
        let response = match ctx.run(exchange).await {
            Err(ctx_err) => return AttemptOutcome::Terminal(ctx_err.into()),
            Ok(Err(transport_err)) => return classify_transport_error(transport_err),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        match classify_status(status, response) {
            Ok(outcome) => outcome,
            Err(response) => {
                self.drain(ctx, response).await;
                AttemptOutcome::Retryable(AttemptFailure::ServerError(status))
            }
        }
    }

    /// Read and discard a body we are not going to hand back.
    async fn drain(&self, ctx: &CallContext, response: Response<Body>) {
        let body = response.into_body().collect();
        match ctx.run(tokio::time::timeout(self.attempt_timeout, body)).await {
            Ok(Ok(Ok(_))) => {}
            Ok(Ok(Err(e))) => tracing::debug!(error = %e, "error draining response body"),
            Ok(Err(_)) => tracing::debug!("timed out draining response body"),
            Err(_) => {}
        }
    }

    fn circuit_open(&self) -> ClientError {
        ClientError::CircuitOpen {
            peer: self.peer_service.clone(),
        }
    }

    fn record(&self, method: &Method, result: CallResult, duration: Duration) {
        let sample = CallSample {
            method: method.clone(),
            peer_service: self.peer_service.clone(),
            result,
            duration,
        };
        if let Err(e) = self.telemetry.record_call(&sample) {
            tracing::warn!(error = %e, "dropping call telemetry");
        }
    }
}

/// Bookkeeping for one logical call between the first granted `allow()` and
/// its final outcome.
///
/// Each granted permit is paired with exactly one breaker record. If the call
/// future is dropped first, `Drop` records the failure, so a half-open trial
/// slot is never leaked, and emits the call's telemetry sample.
struct InFlight<'a> {
    client: &'a ResilientClient,
    method: Method,
    span: Span,
    started: Instant,
    attempts: u32,
    permit: bool,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn new(client: &'a ResilientClient, method: Method, span: Span) -> Self {
        Self {
            client,
            method,
            span,
            started: Instant::now(),
            attempts: 0,
            permit: true,
            finished: false,
        }
    }

    fn allow(&mut self) -> bool {
        self.permit = self.client.breaker.allow();
        self.permit
    }

    fn success(&mut self) {
        if std::mem::take(&mut self.permit) {
            self.client.breaker.record_success();
        }
    }

    fn failure(&mut self) {
        if std::mem::take(&mut self.permit) {
            self.client.breaker.record_failure();
        }
    }

    fn finish(&mut self, result: &Result<Response<Body>, ClientError>) {
        self.finished = true;

        let elapsed = self.started.elapsed();
        match result {
            Ok(response) => {
                spans::record_response(&self.span, response.status(), self.attempts);
                self.client
                    .record(&self.method, CallResult::Status(response.status()), elapsed);
            }
            Err(err) => {
                spans::record_error(&self.span, err, self.attempts);
                let tag = if err.is_circuit_open() {
                    CallResult::CircuitOpen
                } else {
                    CallResult::Error
                };
                self.client.record(&self.method, tag, elapsed);
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.failure();
        tracing::debug!(
            parent: &self.span,
            attempts = self.attempts,
            "call dropped before completion"
        );
        spans::record_dropped(&self.span, self.attempts);
        self.client
            .record(&self.method, CallResult::Error, self.started.elapsed());
    }
}

/// Observer that logs transitions and exports the breaker gauge.
pub fn logging_observer(peer_service: String) -> StateObserver {
    Arc::new(move |change: &StateTransition| {
        match change.to {
            CircuitState::Open => tracing::warn!(
                peer = %peer_service,
                from = %change.from,
                failures = change.failures,
                "circuit opened"
            ),
            CircuitState::HalfOpen => {
                tracing::info!(peer = %peer_service, "circuit half-open, probing recovery")
            }
            CircuitState::Closed => tracing::info!(peer = %peer_service, "circuit closed"),
        }
        metrics::record_breaker_state(&peer_service, change.to);
    })
}

/// Builder for [`ResilientClient`].
pub struct ResilientClientBuilder {
    peer_service: String,
    base_url: Url,
    probe_path: String,
    transport: Option<Arc<dyn Transport>>,
    breaker: Option<CircuitBreaker>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    auth: Option<Arc<dyn AuthHook>>,
    telemetry: Arc<dyn TelemetryRecorder>,
    observer: Option<StateObserver>,
}

impl ResilientClientBuilder {
    fn new(peer_service: String, base_url: Url) -> Self {
        Self {
            peer_service,
            base_url,
            probe_path: "/health".to_string(),
            transport: None,
            breaker: None,
            policy: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(5),
            auth: None,
            telemetry: Arc::new(MetricsRecorder),
            observer: None,
        }
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    pub fn auth_hook(mut self, hook: impl AuthHook + 'static) -> Self {
        self.auth = Some(Arc::new(hook));
        self
    }

    pub fn telemetry(mut self, recorder: impl TelemetryRecorder + 'static) -> Self {
        self.telemetry = Arc::new(recorder);
        self
    }

    /// Replace the default logging observer.
    pub fn on_state_change(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> ResilientClient {
        let observer = self
            .observer
            .unwrap_or_else(|| logging_observer(self.peer_service.clone()));
        let breaker = self
            .breaker
            .unwrap_or_else(|| CircuitBreaker::new(5, Duration::from_secs(30), 1))
            .with_observer(observer);
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::default()));

        ResilientClient {
            peer_service: self.peer_service,
            base_url: self.base_url,
            probe_path: self.probe_path,
            transport,
            breaker,
            policy: self.policy,
            attempt_timeout: self.attempt_timeout,
            auth: self.auth,
            telemetry: self.telemetry,
        }
    }
}
