//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Every problem is collected so a bad file is reported in one go.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GuardConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("downstream.base_url is not a valid http URL: {0}")]
    InvalidBaseUrl(String),
    #[error("downstream.name must not be empty")]
    EmptyPeerName,
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("retries.max_interval_ms ({max}) is below retries.initial_interval_ms ({initial})")]
    IntervalOrder { initial: u64, max: u64 },
    #[error("retries.multiplier must be >= 1.0, got {0}")]
    Multiplier(f64),
    #[error("retries.jitter must be in [0, 1), got {0}")]
    Jitter(f64),
    #[error("health check name `{0}` is used more than once")]
    DuplicateCheck(String),
    #[error("invalid socket address `{address}` for health check `{name}`")]
    TcpAddress { name: String, address: String },
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration, returning every error found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let downstream = &config.downstream;
    if downstream.name.trim().is_empty() {
        errors.push(ValidationError::EmptyPeerName);
    }
    match Url::parse(&downstream.base_url) {
        // The hyper transport has no TLS connector.
        Ok(url) if url.scheme() == "http" => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(downstream.base_url.clone())),
    }
    if downstream.attempt_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "downstream.attempt_timeout_ms" });
    }
    if downstream.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "downstream.connect_timeout_ms" });
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::Zero { field: "retries.max_attempts" });
    }
    if retries.initial_interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "retries.initial_interval_ms" });
    }
    if retries.max_interval_ms < retries.initial_interval_ms {
        errors.push(ValidationError::IntervalOrder {
            initial: retries.initial_interval_ms,
            max: retries.max_interval_ms,
        });
    }
    if !(retries.multiplier >= 1.0 && retries.multiplier.is_finite()) {
        errors.push(ValidationError::Multiplier(retries.multiplier));
    }
    if !(0.0..1.0).contains(&retries.jitter) {
        errors.push(ValidationError::Jitter(retries.jitter));
    }

    let breaker = &config.circuit_breaker;
    if breaker.max_failures == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.max_failures" });
    }
    if breaker.open_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.open_timeout_ms" });
    }
    if breaker.half_open_limit == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.half_open_limit" });
    }

    let health = &config.health;
    if health.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health.interval_secs" });
    }
    if health.check_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "health.check_timeout_ms" });
    }
    // The downstream probe registers under the peer name, so it shares the namespace.
    let mut names = HashSet::from([downstream.name.as_str()]);
    for check in &health.tcp {
        if !names.insert(check.name.as_str()) {
            errors.push(ValidationError::DuplicateCheck(check.name.clone()));
        }
        if check.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::TcpAddress {
                name: check.name.clone(),
                address: check.address.clone(),
            });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TcpCheckConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GuardConfig::default();
        config.retries.max_attempts = 0;
        config.retries.jitter = 1.0;
        config.circuit_breaker.half_open_limit = 0;
        config.downstream.base_url = "not a url".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Jitter(1.0)));
        assert!(errors.contains(&ValidationError::Zero { field: "retries.max_attempts" }));
    }

    #[test]
    fn rejects_interval_inversion_and_shrinking_multiplier() {
        let mut config = GuardConfig::default();
        config.retries.initial_interval_ms = 500;
        config.retries.max_interval_ms = 100;
        config.retries.multiplier = 0.5;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::IntervalOrder { initial: 500, max: 100 }));
        assert!(errors.contains(&ValidationError::Multiplier(0.5)));
    }

    #[test]
    fn rejects_check_names_colliding_with_downstream() {
        let mut config = GuardConfig::default();
        config.health.tcp.push(TcpCheckConfig {
            name: config.downstream.name.clone(),
            address: "127.0.0.1:5432".into(),
        });
        config.health.tcp.push(TcpCheckConfig {
            name: "db".into(),
            address: "localhost".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::DuplicateCheck(_)));
        assert!(matches!(errors[1], ValidationError::TcpAddress { .. }));
    }
}
