//! Outbound Guard
//!
//! Watches the health of a service's outbound dependencies.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        OUTBOUND GUARD                        │
//!   │                                                              │
//!   │  ┌──────────┐   ┌───────────────┐   ┌─────────────────────┐  │
//!   │  │  health  │──▶│   registry    │──▶│  checkers           │  │
//!   │  │ monitor  │   │ (fan-out/in)  │   │  tcp / client probe │  │
//!   │  └──────────┘   └───────────────┘   └──────────┬──────────┘  │
//!   │                                                │             │
//!   │                                                ▼             │
//!   │                         ┌────────────────────────────────┐   │      Downstream
//!   │                         │ resilient client               │───┼────▶ Service
//!   │                         │ breaker / retries / timeouts   │   │
//!   │                         └────────────────────────────────┘   │
//!   │                                                              │
//!   │  ┌────────────────────────────────────────────────────────┐  │
//!   │  │ config │ observability (logs, metrics) │ lifecycle     │  │
//!   │  └────────────────────────────────────────────────────────┘  │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use outbound_guard::client::ResilientClient;
use outbound_guard::config::{load_config, GuardConfig};
use outbound_guard::health::{ClientProbe, HealthMonitor, HealthRegistry, TcpCheck};
use outbound_guard::lifecycle::{wait_for_signal, Shutdown};
use outbound_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "outbound-guard")]
#[command(about = "Resilient outbound client and dependency health monitor", long_about = None)]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single health round, print it as JSON and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.config.as_deref().map(load_config).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("outbound-guard: {e}");
            return ExitCode::from(2);
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("outbound-guard v{} starting", env!("CARGO_PKG_VERSION"));

    match run(config, args.once).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "outbound-guard failed");
            ExitCode::from(2)
        }
    }
}

async fn run(config: GuardConfig, once: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing::info!(
        downstream = %config.downstream.name,
        base_url = %config.downstream.base_url,
        max_attempts = config.retries.max_attempts,
        max_failures = config.circuit_breaker.max_failures,
        tcp_checks = config.health.tcp.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = Arc::new(ResilientClient::from_config(&config)?);
    let registry = Arc::new(HealthRegistry::new());
    registry.register(Arc::new(ClientProbe::new(client)))?;
    for tcp in &config.health.tcp {
        registry.register(Arc::new(TcpCheck::new(tcp.name.clone(), tcp.address.clone())))?;
    }

    let shutdown = Shutdown::new();
    let monitor = HealthMonitor::new(registry, &config.health);

    if once {
        let result = monitor.run_once(&shutdown.token()).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(if result.is_healthy() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if !config.health.enabled {
        tracing::info!("Health monitor disabled, waiting for shutdown");
        wait_for_signal(&shutdown).await;
        return Ok(ExitCode::SUCCESS);
    }

    let task = tokio::spawn(monitor.run(shutdown.token()));
    wait_for_signal(&shutdown).await;
    shutdown.drain(task, Duration::from_secs(5)).await;

    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}
