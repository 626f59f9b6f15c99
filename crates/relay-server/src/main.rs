//! Presence relay for multiplayer rig sync
//!
//! Each participant POSTs its rig to `/sync/{id}` a few times per second and
//! gets back everyone else's. Participants that stop syncing are dropped by a
//! background reaper. Nothing is persisted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_core::{EventBus, LifecycleEvent, ProtocolShape, Reaper, Registry, SyncService};
use relay_server::{AppState, Config, router};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(about = "Presence relay for multiplayer rig sync")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8000, env = "RELAY_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "RELAY_BIND")]
    bind: String,

    /// Path to a JSON config file
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds of silence before a participant is dropped
    #[arg(long, env = "RELAY_TIMEOUT_SECS")]
    timeout_secs: Option<f64>,

    /// Seconds between reap cycles
    #[arg(long, env = "RELAY_REAP_INTERVAL_SECS")]
    reap_interval_secs: Option<f64>,

    /// Protocol shape: "combined" or "split"
    #[arg(long, env = "RELAY_PROTOCOL")]
    protocol: Option<ProtocolShape>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - RUST_LOG wins over --verbose
    let default_filter = if cli.verbose {
        "relay_server=debug,relay_core=debug,tower_http=debug"
    } else {
        "relay_server=info,relay_core=info,tower_http=debug"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, CLI/env overriding the file
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(timeout_secs) = cli.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    if let Some(reap_interval_secs) = cli.reap_interval_secs {
        config.reap_interval_secs = reap_interval_secs;
    }
    if let Some(protocol) = cli.protocol {
        config.protocol = protocol;
    }
    let reaper_config = config.reaper_config().context("Invalid reaper settings")?;

    let registry = Arc::new(Registry::new());
    let events = Arc::new(EventBus::new());
    let _event_log = events.subscribe(LifecycleEvent::log);

    let reaper = Reaper::new(Arc::clone(&registry), Arc::clone(&events), reaper_config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = reaper.spawn(shutdown_rx);

    let state = Arc::new(AppState::new(SyncService::new(
        registry,
        events,
        config.protocol,
    )));
    let app = router(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", cli.bind, cli.port))?;

    tracing::info!("Starting relay-server on {}", addr);
    tracing::info!(
        "Protocol: {}, timeout: {}s, reap interval: {}s",
        config.protocol,
        config.timeout_secs,
        config.reap_interval_secs
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the reaper once in-flight requests have drained
    let _ = shutdown_tx.send(true);
    if let Err(e) = reaper_handle.await {
        tracing::error!("Reaper task failed: {}", e);
    }

    tracing::info!("Relay server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
