//! Scheduler Extender - node scoring from live resource metrics
//!
//! Runs as a Deployment next to the cluster scheduler, answering its filter
//! and prioritize callbacks with scores derived from the monitoring backend.

use anyhow::Result;
use clap::Parser;
use scheduler_extender::{api, config::ExtenderConfig};
use scorer_lib::{
    health::{components, HealthRegistry},
    metrics::PrometheusSource,
    ExtenderMetrics, ScoringService, StructuredLogger,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXTENDER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Node-scoring scheduler extender
#[derive(Parser)]
#[command(name = "scheduler-extender")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "EXTENDER_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port, overrides the configuration file
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();
    let config = ExtenderConfig::load(args.config.as_deref())?.with_port(args.port);
    info!(
        instance = %config.instance,
        backend = %config.backend.base_url,
        timeout_ms = config.backend.query_timeout_ms,
        "Extender configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::METRICS_BACKEND).await;

    let metrics = ExtenderMetrics::new();
    let logger = StructuredLogger::new(&config.instance);

    let source = PrometheusSource::new(&config.backend, metrics.clone(), logger.clone())?;
    let service = ScoringService::new(
        Arc::new(source),
        config.policy.clone(),
        health_registry.clone(),
        metrics,
        logger.clone(),
    );

    let app_state = Arc::new(api::AppState::new(service, health_registry.clone()));
    health_registry.set_ready(true).await;
    logger.log_startup(EXTENDER_VERSION, config.port, &config.backend.base_url);

    let shutdown_logger = logger.clone();
    api::serve(config.port, app_state, async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_logger.log_shutdown("SIGINT received"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
