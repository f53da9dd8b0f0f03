//! Concurrent health aggregation.
//!
//! # Responsibilities
//! - Hold a uniquely-named set of checkers
//! - Evaluate all of them concurrently on demand and reduce to one status
//!
//! # Design Decisions
//! - Registration takes the write lock; evaluation works on a snapshot taken
//!   under the read lock, so registering during a round never tears it
//! - One task per checker; each task returns its own entry and entries are
//!   merged after the join, so no map is shared between tasks
//! - A checker is bounded only by the caller's context

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::time::Instant;

use crate::client::{BoxError, CallContext};
use crate::observability::metrics;

/// Anything that can report on a dependency.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    /// `Ok` when the dependency is usable. The error becomes the entry's message.
    async fn check(&self, ctx: &CallContext) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Outcome of one checker in one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl CheckResult {
    fn healthy(duration: Duration) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            duration,
        }
    }

    fn unhealthy(message: String, duration: Duration) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message),
            duration,
        }
    }
}

/// Aggregate of one evaluation round. A fresh value per round.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResult {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, CheckResult>,
    #[serde(serialize_with = "serialize_unix_millis")]
    pub timestamp: SystemTime,
}

impl HealthResult {
    fn reduce(checks: BTreeMap<String, CheckResult>) -> Self {
        let status = if checks
            .values()
            .any(|check| check.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        };
        Self {
            status,
            checks,
            timestamp: SystemTime::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Names of the failing checkers, in name order.
    pub fn failing(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|(_, check)| check.status == HealthStatus::Unhealthy)
            .map(|(name, _)| name.as_str())
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

fn serialize_unix_millis<S: Serializer>(
    timestamp: &SystemTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    serialize_millis(&since_epoch, serializer)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("health checker `{name}` is already registered")]
    DuplicateChecker { name: String },
}

#[derive(Default)]
pub struct HealthRegistry {
    checkers: RwLock<Vec<Arc<dyn HealthCheck>>>,
}

impl std::fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthRegistry")
            .field("checkers", &self.names())
            .finish()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a checker. A name that is already taken leaves the registry unchanged.
    pub fn register(&self, checker: Arc<dyn HealthCheck>) -> Result<(), RegistryError> {
        let mut checkers = self
            .checkers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let name = checker.name();
        if checkers.iter().any(|existing| existing.name() == name) {
            return Err(RegistryError::DuplicateChecker {
                name: name.to_string(),
            });
        }
        tracing::debug!(checker = %name, "health checker registered");
        checkers.push(checker);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|checker| checker.name().to_string())
            .collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn HealthCheck>> {
        self.checkers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run every registered checker concurrently and reduce the results.
    ///
    /// Never fails: checker errors, panics and context expiry all become
    /// Unhealthy entries. With no checkers the result is Healthy and empty.
    pub async fn check_all(&self, ctx: &CallContext) -> HealthResult {
        let checkers = self.snapshot();
        let started = Instant::now();

        let (names, tasks): (Vec<String>, Vec<_>) = checkers
            .into_iter()
            .map(|checker| {
                let name = checker.name().to_string();
                let ctx = ctx.clone();
                (name, tokio::spawn(async move { run_check(checker, ctx).await }))
            })
            .unzip();

        let joined = join_all(tasks).await;

        let mut checks = BTreeMap::new();
        for (name, outcome) in names.into_iter().zip(joined) {
            let result = outcome.unwrap_or_else(|e| {
                tracing::error!(checker = %name, error = %e, "health checker task failed");
                let reason = if e.is_panic() { "checker panicked" } else { "checker task aborted" };
                CheckResult::unhealthy(reason.to_string(), started.elapsed())
            });
            metrics::record_health_check(
                &name,
                result.status == HealthStatus::Healthy,
                result.duration,
            );
            checks.insert(name, result);
        }

        let result = HealthResult::reduce(checks);
        tracing::debug!(
            request_id = ctx.request_id().unwrap_or("-"),
            status = ?result.status,
            checkers = result.checks.len(),
            elapsed = ?started.elapsed(),
            "health round complete"
        );
        result
    }
}

async fn run_check(checker: Arc<dyn HealthCheck>, ctx: CallContext) -> CheckResult {
    let started = Instant::now();
    let outcome = ctx.run(checker.check(&ctx)).await;
    let duration = started.elapsed();

    match outcome {
        Ok(Ok(())) => CheckResult::healthy(duration),
        Ok(Err(e)) => {
            tracing::warn!(checker = %checker.name(), error = %e, "health check failed");
            CheckResult::unhealthy(e.to_string(), duration)
        }
        Err(e) => {
            tracing::warn!(checker = %checker.name(), error = %e, "health check cut short");
            CheckResult::unhealthy(e.to_string(), duration)
        }
    }
}
