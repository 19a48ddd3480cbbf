use anyhow::Context;
use backend_lib::{
    config::{Settings, DEFAULT_CONFIG_PATH},
    storage::FlatFileStorage,
    ws_router, AppState,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Real-time collaboration hub: meeting rooms, chat, presence and WebRTC signaling
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file; a missing file falls back to built-in defaults
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    init_tracing(&settings);

    let storage = FlatFileStorage::new(&settings.storage.path)
        .with_context(|| format!("opening storage at {}", settings.storage.path.display()))?;
    let state = Arc::new(AppState::new(storage, &settings)?);

    let horizon = settings.meetings.activation_horizon()?;
    spawn_activation_scanner(state.clone(), horizon);
    spawn_rate_limit_cleanup(state.clone());

    let app = ws_router::create_router(state);

    let addr = settings.bind_addr().await?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, policy = ?settings.meetings.join_policy, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// `RUST_LOG` wins over `logging.level`
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    if settings.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Periodically activate meetings that are about to start
fn spawn_activation_scanner(state: Arc<AppState<FlatFileStorage>>, horizon: chrono::Duration) {
    let period = Duration::from_secs(state.settings.meetings.scan_interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = state
                .meetings
                .scan_for_imminent_meetings(chrono::Utc::now(), horizon)
                .await
            {
                tracing::error!(error = %e, "meeting activation scan failed");
            }
        }
    });
}

fn spawn_rate_limit_cleanup(state: Arc<AppState<FlatFileStorage>>) {
    let period = Duration::from_secs(state.settings.rate_limit.window_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            state.rate_limiter.cleanup();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
