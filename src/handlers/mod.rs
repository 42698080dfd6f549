//! NATS message handlers

pub mod optimization;
pub mod ping;

use anyhow::Result;
use async_nats::Client;
use std::sync::Arc;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::optimizer::RouteOptimizer;

/// Start all message handlers
pub async fn start_handlers(client: Client, optimizer: Arc<RouteOptimizer>, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let jwt_secret = Arc::new(config.jwt_secret.clone());

    // Subscribe to all subjects
    let ping_sub = client.subscribe("susmi.ping").await?;
    let optimize_sub = client.subscribe("susmi.route.optimize").await?;
    let get_sub = client.subscribe("susmi.route.optimization.get").await?;
    let list_sub = client.subscribe("susmi.route.optimization.list").await?;
    let apply_sub = client.subscribe("susmi.route.optimization.apply").await?;
    let reject_sub = client.subscribe("susmi.route.optimization.reject").await?;

    info!("Subscribed to NATS subjects");

    // Spawn handlers
    let ping_handle = tokio::spawn({
        let client = client.clone();
        async move { ping::handle_ping(client, ping_sub).await }
    });

    let optimize_handle = tokio::spawn({
        let (client, optimizer, jwt_secret) = (client.clone(), Arc::clone(&optimizer), Arc::clone(&jwt_secret));
        async move { optimization::handle_optimize(client, optimize_sub, optimizer, jwt_secret).await }
    });

    let get_handle = tokio::spawn({
        let (client, optimizer, jwt_secret) = (client.clone(), Arc::clone(&optimizer), Arc::clone(&jwt_secret));
        async move { optimization::handle_get(client, get_sub, optimizer, jwt_secret).await }
    });

    let list_handle = tokio::spawn({
        let (client, optimizer, jwt_secret) = (client.clone(), Arc::clone(&optimizer), Arc::clone(&jwt_secret));
        async move { optimization::handle_list(client, list_sub, optimizer, jwt_secret).await }
    });

    let apply_handle = tokio::spawn({
        let (client, optimizer, jwt_secret) = (client.clone(), Arc::clone(&optimizer), Arc::clone(&jwt_secret));
        async move { optimization::handle_apply(client, apply_sub, optimizer, jwt_secret).await }
    });

    let reject_handle = tokio::spawn(async move {
        optimization::handle_reject(client, reject_sub, optimizer, jwt_secret).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (they shouldn't unless there's an error)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = optimize_handle => {
            error!("Optimize handler finished: {:?}", result);
        }
        result = get_handle => {
            error!("Optimization get handler finished: {:?}", result);
        }
        result = list_handle => {
            error!("Optimization list handler finished: {:?}", result);
        }
        result = apply_handle => {
            error!("Optimization apply handler finished: {:?}", result);
        }
        result = reject_handle => {
            error!("Optimization reject handler finished: {:?}", result);
        }
    }

    Ok(())
}
