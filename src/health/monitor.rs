//! Periodic health aggregation.
//!
//! # Responsibilities
//! - Run a registry round on a fixed interval
//! - Publish the latest result to subscribers
//! - Log changes of the aggregate status

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::CallContext;
use crate::config::HealthConfig;
use crate::health::registry::{HealthRegistry, HealthResult, HealthStatus};

pub struct HealthMonitor {
    registry: Arc<HealthRegistry>,
    interval: Duration,
    round_timeout: Duration,
    latest: watch::Sender<Option<HealthResult>>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<HealthRegistry>, config: &HealthConfig) -> Self {
        Self::with_timing(
            registry,
            Duration::from_secs(config.interval_secs),
            Duration::from_millis(config.check_timeout_ms),
        )
    }

    pub fn with_timing(
        registry: Arc<HealthRegistry>,
        interval: Duration,
        round_timeout: Duration,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            registry,
            interval,
            round_timeout,
            latest,
        }
    }

    /// Receiver for the most recent round. `None` until the first round ends.
    pub fn subscribe(&self) -> watch::Receiver<Option<HealthResult>> {
        self.latest.subscribe()
    }

    /// Run one round with a fresh request id and the round deadline.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> HealthResult {
        let ctx = CallContext::new()
            .with_request_id(Uuid::new_v4().to_string())
            .with_cancellation(shutdown.child_token())
            .with_timeout(self.round_timeout);
        self.registry.check_all(&ctx).await
    }

    /// Tick until `shutdown` is cancelled. The first round starts immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval = ?self.interval,
            round_timeout = ?self.round_timeout,
            checkers = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_status: Option<HealthStatus> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let result = self.run_once(&shutdown).await;
                    if shutdown.is_cancelled() {
                        continue;
                    }
                    log_transition(last_status, &result);
                    last_status = Some(result.status);
                    self.latest.send_replace(Some(result));
                }
            }
        }
    }
}

fn log_transition(previous: Option<HealthStatus>, result: &HealthResult) {
    if previous == Some(result.status) {
        return;
    }
    match result.status {
        HealthStatus::Healthy => {
            tracing::info!(checkers = result.checks.len(), "aggregate health is healthy")
        }
        HealthStatus::Unhealthy => {
            let failing: Vec<&str> = result.failing().collect();
            tracing::warn!(failing = ?failing, "aggregate health is unhealthy");
        }
    }
}
