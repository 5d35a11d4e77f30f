use anyhow::{Context, Result};
use homeflux::api::{create_admin_router, create_host_router, AdminAppState, HostAppState};
use homeflux::config::load_config_or_default;
use homeflux::forwarder::Forwarder;
use homeflux::scheduler::HeartbeatScheduler;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeflux=info".into()),
        )
        .init();

    info!("homeflux starting...");

    // Read configuration
    let config_path =
        std::env::var("HOMEFLUX_CONFIG").unwrap_or_else(|_| "homeflux.toml".to_string());
    let mut config = load_config_or_default(&config_path)?;
    config.apply_env_overrides();

    let admin_token = std::env::var("HOMEFLUX_ADMIN_TOKEN").ok();
    if admin_token.is_none() {
        warn!("HOMEFLUX_ADMIN_TOKEN not set, PUT /api/config is unrestricted");
    }

    info!(
        config_path = %config_path,
        influx = %config.influx.base_url(),
        database = %config.influx.database,
        mode = %config.policy.mode,
        listen = %config.api.listen,
        "Configuration loaded"
    );

    let listen = config.api.listen.clone();
    let forwarder = Arc::new(Forwarder::new(config));

    // Writes stay no-ops until a later reconfigure succeeds
    if !forwarder.connect().await {
        warn!("InfluxDB session not ready, changes will be dropped until reconnect");
    }

    // Start heartbeat scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = HeartbeatScheduler::new(Arc::clone(&forwarder));
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    // Start HTTP API server
    let router = create_host_router(HostAppState {
        forwarder: Arc::clone(&forwarder),
    })
    .merge(create_admin_router(AdminAppState {
        forwarder: Arc::clone(&forwarder),
        admin_token,
    }));

    let listener = tokio::net::TcpListener::bind(listen.as_str())
        .await
        .with_context(|| format!("Failed to bind host API on {}", listen))?;
    info!(listen = %listen, "Host API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Host API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Graceful shutdown
    server_handle.abort();
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }
    info!("homeflux stopped");

    Ok(())
}
