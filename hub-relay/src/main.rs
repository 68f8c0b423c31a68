//! Hub Relay web server.
//!
//! Startup order matters: configuration is loaded and the webhook secret is
//! decrypted before the listener is bound, so no request is ever served
//! without a verified secret. Any startup error exits the process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hubrelay::{bootstrap, decryptor_for, router, AppState, Config, KeyService, Publisher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("hub_relay_starting");

    let config = Config::from_env().context("Failed to load configuration")?;
    let key_service = match config.key_service {
        KeyService::Http { .. } => "http",
        KeyService::Local { .. } => "local",
    };
    info!(
        port = config.port,
        key_service = key_service,
        relay_timeout_ms = config.relay_timeout.as_millis() as u64,
        max_body_bytes = config.max_body_bytes,
        "config_loaded"
    );

    let decryptor = decryptor_for(&config).context("Failed to build key service client")?;
    let (secret, target) = bootstrap(&config, decryptor.as_ref())
        .await
        .context("Failed to bootstrap webhook secret")?;
    drop(decryptor);

    info!(
        endpoint = %target.endpoint(),
        queue = %target.queue,
        "rabbitmq_target_resolved"
    );

    let publisher = Publisher::new(target);

    let state = AppState::new(secret, Arc::new(publisher.clone()))
        .with_relay_timeout(config.relay_timeout)
        .with_max_body_bytes(config.max_body_bytes);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    publisher.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
