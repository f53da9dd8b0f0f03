//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through and failures are counted
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls probe recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= max_failures
//! Open → Half-Open: first allow() after open_timeout
//! Half-Open → Closed: a trial call succeeds
//! Half-Open → Open: a trial call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per downstream, owned by its client
//! - All bookkeeping is O(1) under a single mutex that is never held across I/O
//! - Transitions are pushed to an observer callback instead of being polled

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change reported to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
    /// Consecutive failures at the time of the transition.
    pub failures: u32,
}

/// Callback invoked synchronously on every transition.
pub type StateObserver = Arc<dyn Fn(&StateTransition) + Send + Sync>;

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState) -> StateTransition {
        let change = StateTransition {
            from: self.state,
            to,
            failures: self.failures,
        };
        self.state = to;
        change
    }

    fn trip(&mut self, now: Instant) -> StateTransition {
        let change = self.transition(CircuitState::Open);
        self.opened_at = Some(now);
        self.half_open_in_flight = 0;
        change
    }
}

/// Circuit breaker guarding a single downstream dependency.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    max_failures: u32,
    open_timeout: Duration,
    half_open_limit: u32,
    observer: Option<StateObserver>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("max_failures", &self.max_failures)
            .field("open_timeout", &self.open_timeout)
            .field("half_open_limit", &self.half_open_limit)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(max_failures: u32, open_timeout: Duration, half_open_limit: u32) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                half_open_in_flight: 0,
            }),
            max_failures: max_failures.max(1),
            open_timeout,
            half_open_limit: half_open_limit.max(1),
            observer: None,
        }
    }

    /// Create a closed breaker from configuration.
    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(
            config.max_failures,
            Duration::from_millis(config.open_timeout_ms),
            config.half_open_limit,
        )
    }

    /// Attach the transition observer.
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current state. Does not advance Open → Half-Open; only `allow()` does.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Ask permission for one call.
    ///
    /// Every `true` must be followed by exactly one `record_success` or
    /// `record_failure`, which is what releases a half-open trial slot.
    pub fn allow(&self) -> bool {
        let (allowed, change) = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => (true, None),
                CircuitState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map_or(self.open_timeout, |opened| opened.elapsed());
                    if elapsed >= self.open_timeout {
                        let change = inner.transition(CircuitState::HalfOpen);
                        inner.half_open_in_flight = 1;
                        (true, Some(change))
                    } else {
                        (false, None)
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.half_open_in_flight < self.half_open_limit {
                        inner.half_open_in_flight += 1;
                        (true, None)
                    } else {
                        (false, None)
                    }
                }
            }
        };

        self.notify(change);
        allowed
    }

    /// Report a successful call.
    pub fn record_success(&self) {
        let change = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    let change = inner.transition(CircuitState::Closed);
                    inner.failures = 0;
                    inner.opened_at = None;
                    inner.half_open_in_flight = 0;
                    Some(change)
                }
                CircuitState::Open => None,
            }
        };

        self.notify(change);
    }

    /// Report a failed call.
    pub fn record_failure(&self) {
        let change = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.failures = inner.failures.saturating_add(1);
                    if inner.failures >= self.max_failures {
                        Some(inner.trip(Instant::now()))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => Some(inner.trip(Instant::now())),
                CircuitState::Open => None,
            }
        };

        self.notify(change);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock still holds usable data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: Option<StateTransition>) {
        if let (Some(change), Some(observer)) = (change, &self.observer) {
            observer(&change);
        }
    }
}
