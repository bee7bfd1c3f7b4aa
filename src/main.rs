//! CrossLend engine entrypoint
//!
//! Wires configuration, persistence, and the cross-chain collaborators
//! together, then runs the health monitor until shutdown.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use crosslend_server::config::{Config, Environment};
use crosslend_server::endorsement::EndorsementManager;
use crosslend_server::messenger::{GatewayMessenger, RetryPolicy};
use crosslend_server::monitor::{HealthMonitor, MonitorConfig};
use crosslend_server::oracle::{FeedPriceOracle, PriceOracle, StaticPriceOracle};
use crosslend_server::repository::{
    EndorsementRepository, InMemoryRepository, LoanRepository, PostgresRepository,
};
use crosslend_server::services::RiskEngine;
use crosslend_server::verifier::Ed25519Verifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        database = %config.database_url_masked(),
        gateway = %config.gateway_url,
        "Starting CrossLend engine"
    );

    let (loans, endorsement_store): (Arc<dyn LoanRepository>, Arc<dyn EndorsementRepository>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("failed to connect to the database")?;
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("failed to run database migrations")?;
                tracing::info!("Database connection established");
                let repository = Arc::new(PostgresRepository::new(pool));
                (repository.clone(), repository)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; loans will not survive a restart");
                let repository = Arc::new(InMemoryRepository::new());
                (repository.clone(), repository)
            }
        };

    let oracle: Arc<dyn PriceOracle> = match config.environment {
        Environment::Development => Arc::new(StaticPriceOracle::sample()),
        _ => Arc::new(FeedPriceOracle::new(config.price_feed_url.clone())),
    };

    let messenger = Arc::new(GatewayMessenger::new(
        config.gateway_url.clone(),
        config.gateway_api_key.clone(),
        Duration::from_secs(config.messenger_timeout_seconds),
    ));
    let retry = RetryPolicy::new(config.messenger_max_attempts, Duration::from_millis(500));

    let endorsements =
        EndorsementManager::new(endorsement_store.clone(), Arc::new(Ed25519Verifier::new()));

    let engine = Arc::new(RiskEngine::new(
        loans.clone(),
        endorsement_store,
        endorsements,
        oracle.clone(),
        messenger,
        retry,
    ));

    let monitor = Arc::new(HealthMonitor::new(
        engine,
        loans,
        oracle,
        MonitorConfig {
            interval: Duration::from_secs(config.monitor_interval_seconds),
            ..MonitorConfig::default()
        },
    ));
    tokio::spawn(monitor.run());

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping CrossLend engine");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
