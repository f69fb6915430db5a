//! Flywheel - auto-suspending reverse proxy
//!
//! This is the main entry point of the `flywheel` binary.
//!
//! # Configuration
//!
//! Reads a JSON config from `FLYWHEEL_CONFIG` (default
//! `/etc/flywheel/config.json`). `LISTEN_ADDR` and `FLYWHEEL_STATUS_FILE`
//! override the matching settings.
//!
//! Without `resources.api_url` lifecycle calls are logged and skipped, which is
//! handy for trying the proxy locally.

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flywheel_control::{
    health, Flywheel, HealthWatcher, HttpResourceClient, NoopResourceClient, ResourceClient,
    StatusSnapshot,
};
use flywheel_gateway::{create_router, FlywheelConfig, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flywheel=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting flywheel");

    let config = FlywheelConfig::from_env()?;

    tracing::info!(
        listen_addr = %config.gateway.listen_addr,
        endpoint = %config.gateway.endpoint,
        vhosts = config.gateway.vhosts.len(),
        status_file = %config.gateway.status_file.display(),
        idle_timeout_secs = config.control.idle_timeout_seconds,
        instances = config.control.instances.len(),
        resource_api = ?config.resources.api_url,
        "Configuration loaded"
    );

    match config.resources.api_url.clone() {
        Some(url) => {
            tracing::info!(api_url = %url, "Resource API integration enabled");
            let client = Arc::new(HttpResourceClient::new(url, config.resources.timeout())?);
            run(config, client).await
        }
        None => {
            tracing::warn!("No resources.api_url set - lifecycle calls will be skipped");
            run(config, Arc::new(NoopResourceClient::new())).await
        }
    }
}

async fn run<R: ResourceClient + 'static>(
    config: FlywheelConfig,
    client: Arc<R>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status_file = config.gateway.status_file.clone();

    let mut flywheel = Flywheel::new(Arc::clone(&client), &config.control, Utc::now());
    flywheel.restore(&StatusSnapshot::read_or_default(&status_file), Utc::now());

    let (health_tx, health_rx) = health::channel();
    let watcher = HealthWatcher::new(client, &config.control, flywheel.subscribe(), health_tx).spawn();
    let (handle, authority) = flywheel.spawn(health_rx);

    let state = GatewayState::new(handle.clone(), config.gateway.clone())?;
    let app = create_router(state);

    // Start HTTP server
    let listen_addr = &config.gateway.listen_addr;
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, shutting down authority");
    handle.shutdown().await;
    let flywheel = authority.await?;
    flywheel.snapshot().write(&status_file);

    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "Health watcher task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
