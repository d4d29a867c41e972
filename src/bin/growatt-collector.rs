#[path = "../bin_common.rs"]
mod common;

use clap::Parser;
use common::ConnectionArgs;
use growatt_rs::Inverter;
use growatt_rs::collector::{ApiServer, InverterMetrics, Worker};
use growatt_rs::config::DEFAULT_POLL_INTERVAL_SECS;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "growatt-collector")]
#[command(about = "Poll a Growatt inverter and serve metrics and controls over HTTP")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Polling interval in seconds (minimum 1)
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Address for the HTTP API (/metrics, /snapshot, controls)
    #[arg(long, default_value = "0.0.0.0:9090")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let config = args.connection.into_config_with_poll(args.poll_interval)?;

    let cancel = CancellationToken::new();

    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        cancel_signal.cancel();
    });

    tracing::info!(
        "Monitoring {} at {} (unit {}) every {:?}",
        config.name,
        config.socket_label(),
        config.unit_id,
        config.poll_interval
    );

    let metrics = Arc::new(InverterMetrics::default());
    let mut registry = Registry::default();
    metrics.register(&mut registry);
    let registry = Arc::new(registry);

    let (worker, handle) = Worker::new(Inverter::from_config(&config), metrics);

    let server = ApiServer::new(registry, handle, args.listen, cancel.clone());
    let cancel_server = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("API server error: {}", e);
            cancel_server.cancel();
        }
    });

    worker.run(config.poll_interval, cancel.clone()).await;

    server_handle.await.ok();

    tracing::info!("Shutdown complete");
    Ok(())
}
