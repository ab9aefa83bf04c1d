//! Pool Coordinator - edge node taint and eviction service
//!
//! Watches nodes and node leases, taints nodes that are only reachable
//! through delegated heartbeats, and serves the pod admission webhooks.
//!
//! # HTTP Endpoints
//!
//! - `POST /pool-coordinator-webhook-validate` - Validate pod deletion
//! - `POST /pool-coordinator-webhook-mutate` - Inject edge tolerations
//! - `GET /pool-coordinator-webhook-health` - Health check
//! - `GET /pool-coordinator/pools/:pool` - Pool membership

use std::sync::Arc;

use pool_coordinator::watch::{run_lease_watcher, run_node_watcher};
use pool_coordinator::webhook::create_router;
use pool_coordinator::{Coordinator, CoordinatorConfig, KubeNodeUpdater};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pool_coordinator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pool Coordinator");

    let config = CoordinatorConfig::from_env();
    config.validate()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        lease_namespace = %config.lease_namespace,
        liveness_window_secs = config.lease_liveness_window_seconds,
        "Loaded coordinator configuration"
    );

    let client = kube::Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    let listen_addr = config.listen_addr.clone();
    let updater = Arc::new(KubeNodeUpdater::new(client.clone()));
    let coordinator = Arc::new(Coordinator::new(config, updater));

    tokio::spawn(run_node_watcher(client.clone(), Arc::clone(&coordinator)));
    tokio::spawn(run_lease_watcher(client, Arc::clone(&coordinator)));
    tracing::info!("Started node and lease watchers");

    let app = create_router(coordinator);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
