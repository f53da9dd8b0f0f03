//! Health registry tests against real dependencies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use outbound_guard::client::{BoxError, CallContext, ResilientClient};
use outbound_guard::health::{
    ClientProbe, FnCheck, HealthRegistry, HealthStatus, RegistryError, TcpCheck,
};
use outbound_guard::observability::NoopRecorder;
use outbound_guard::{CircuitBreaker, CircuitState};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn test_db_healthy_cache_down() {
    let db = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let registry = HealthRegistry::new();
    registry
        .register(Arc::new(TcpCheck::new("db", db.local_addr().unwrap().to_string())))
        .unwrap();
    registry
        .register(Arc::new(FnCheck::new("cache", |_ctx| async {
            Err::<(), BoxError>("timeout".into())
        })))
        .unwrap();

    let result = registry.check_all(&CallContext::new()).await;

    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(result.checks.len(), 2);
    assert_eq!(result.checks["db"].status, HealthStatus::Healthy);
    assert_eq!(result.checks["cache"].status, HealthStatus::Unhealthy);
    assert_eq!(result.checks["cache"].message.as_deref(), Some("timeout"));
    assert_eq!(result.checks["db"].message, None);
}

#[tokio::test]
async fn test_empty_registry_is_healthy() {
    let result = HealthRegistry::new().check_all(&CallContext::new()).await;
    assert!(result.is_healthy());
    assert!(result.checks.is_empty());
}

#[tokio::test]
async fn test_slow_checker_does_not_block_others() {
    let registry = HealthRegistry::new();
    registry
        .register(Arc::new(FnCheck::new("slow", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<(), BoxError>(())
        })))
        .unwrap();
    for name in ["queue", "search", "blob"] {
        registry
            .register(Arc::new(FnCheck::new(name, |_ctx| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<(), BoxError>(())
            })))
            .unwrap();
    }

    let started = Instant::now();
    let ctx = CallContext::new().with_timeout(Duration::from_millis(300));
    let result = registry.check_all(&ctx).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(result.failing().collect::<Vec<_>>(), vec!["slow"]);
    for name in ["queue", "search", "blob"] {
        let check = &result.checks[name];
        assert_eq!(check.status, HealthStatus::Healthy);
        assert!(check.duration < Duration::from_millis(300));
    }
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let registry = HealthRegistry::new();
    registry
        .register(Arc::new(TcpCheck::new("db", "127.0.0.1:5432")))
        .unwrap();

    let err = registry
        .register(Arc::new(TcpCheck::new("db", "127.0.0.1:6432")))
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateChecker { name: "db".into() });
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_client_probe_reports_status() {
    let backend = common::start_programmable_backend(|seen| async move {
        if seen.path() == "/health" {
            common::Reply::status(200)
        } else {
            common::Reply::status(404)
        }
    })
    .await;

    let healthy = Arc::new(common::client_for(backend.url(), 3, 5));
    let registry = HealthRegistry::new();
    registry.register(Arc::new(ClientProbe::new(healthy))).unwrap();
    let result = registry.check_all(&CallContext::new()).await;
    assert!(result.is_healthy(), "{:?}", result.checks);
    assert!(result.checks.contains_key("inventory"));

    let misrouted = outbound_guard::ResilientClient::builder("billing", backend.url())
        .probe_path("/status")
        .telemetry(outbound_guard::observability::NoopRecorder)
        .build();
    let registry = HealthRegistry::new();
    registry
        .register(Arc::new(ClientProbe::new(Arc::new(misrouted))))
        .unwrap();
    let result = registry.check_all(&CallContext::new()).await;
    assert_eq!(
        result.checks["billing"].message.as_deref(),
        Some("probe returned 404")
    );
}

#[tokio::test]
async fn test_abandoned_half_open_call_does_not_wedge_the_circuit() {
    let backend = common::start_programmable_backend(|seen| async move {
        match seen.index {
            0 => common::Reply::status(503),
            1 => common::Reply::status(200).after(Duration::from_secs(5)),
            _ => common::Reply::status(200),
        }
    })
    .await;

    let client = Arc::new(
        ResilientClient::builder("inventory", backend.url())
            .retry_policy(common::fast_policy(1))
            .circuit_breaker(CircuitBreaker::new(1, Duration::from_millis(200), 1))
            .attempt_timeout(Duration::from_secs(10))
            .telemetry(NoopRecorder)
            .build(),
    );

    // Calls with its own context, so only the round deadline can stop it.
    let registry = HealthRegistry::new();
    let shared = client.clone();
    registry
        .register(Arc::new(FnCheck::new("inventory", move |_ctx| {
            let client = shared.clone();
            async move {
                let status = client.probe(&CallContext::new()).await?;
                if status.is_success() {
                    Ok::<(), BoxError>(())
                } else {
                    Err(format!("status {}", status.as_u16()).into())
                }
            }
        })))
        .unwrap();

    let round = || CallContext::new().with_timeout(Duration::from_millis(300));

    let result = registry.check_all(&round()).await;
    assert!(!result.is_healthy());
    assert_eq!(client.circuit_state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let result = registry.check_all(&round()).await;
    assert_eq!(
        result.checks["inventory"].message.as_deref(),
        Some("context deadline exceeded")
    );
    assert_eq!(client.circuit_state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let result = registry.check_all(&round()).await;
    assert!(result.is_healthy(), "{:?}", result.checks);
    assert_eq!(client.circuit_state(), CircuitState::Closed);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_result_serializes_to_json() {
    let registry = HealthRegistry::new();
    registry
        .register(Arc::new(FnCheck::new("cache", |_ctx| async {
            Err::<(), BoxError>("connection refused".into())
        })))
        .unwrap();

    let result = registry.check_all(&CallContext::new()).await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["checks"]["cache"]["status"], "unhealthy");
    assert_eq!(json["checks"]["cache"]["message"], "connection refused");
    assert!(json["checks"]["cache"]["duration_ms"].is_u64());
    assert!(json["timestamp"].is_u64());
}
