//! S.U.S.M.I Route Worker - route and schedule optimization service
//!
//! This worker connects to NATS and answers route optimization requests.

mod auth;
mod cli;
mod config;
mod db;
mod error;
mod handlers;
mod services;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::optimizer::RouteOptimizer;
use crate::services::routing::{create_maps_provider, FallbackSource, RandomFallback};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,susmi_route_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => migrate(&config).await,
        Command::Serve => serve(config).await,
    }
}

async fn migrate(config: &Config) -> Result<()> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    let pool = db::create_pool(database_url).await?;
    db::run_migrations(&pool).await
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting S.U.S.M.I Route Worker...");

    let store = db::create_store(&config).await?;
    info!("Optimization store ready: {}", store.name());

    let provider = create_maps_provider(config.maps.clone());

    let fallback: Arc<dyn FallbackSource> = match config.fallback_seed {
        Some(seed) => {
            info!("Fallback estimates seeded with {}", seed);
            Arc::new(RandomFallback::seeded(seed))
        }
        None => Arc::new(RandomFallback::new()),
    };
    info!("Fallback estimates: {}", fallback.name());

    let optimizer = Arc::new(RouteOptimizer::new(
        store,
        provider,
        fallback,
        config.provider_timeout(),
    ));

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match &config.nats_credentials {
        Some(credentials) => {
            async_nats::ConnectOptions::new()
                .user_and_password(credentials.user.clone(), credentials.password.clone())
                .connect(&config.nats_url)
                .await?
        }
        None => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, optimizer, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
