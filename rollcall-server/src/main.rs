//! rollcall-server - Classroom attendance service
//!
//! Lecture lifecycle, photo-based attendance generation, student disputes,
//! administrative overrides and the audit ledger over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_common::config::{
    default_config_path, load_toml_config, prepare_root_folder, resolve_root_folder, DEFAULT_PORT,
};
use rollcall_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_server::config::AttendanceSettings;
use rollcall_server::services::HttpFaceClient;
use rollcall_server::AppState;

/// Command-line arguments for rollcall-server
#[derive(Parser, Debug)]
#[command(name = "rollcall-server")]
#[command(about = "Classroom attendance lifecycle service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ROLLCALL_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long, env = "ROLLCALL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML file
    #[arg(short, long, env = "ROLLCALL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let toml_config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&toml_config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rollcall-server {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = prepare_root_folder(&root_folder).context("Failed to initialize root folder")?;
    info!("Database: {}", db_path.display());

    let db_pool = rollcall_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let settings = AttendanceSettings::load(&db_pool, &toml_config)
        .await
        .context("Failed to load attendance settings")?;

    let face = HttpFaceClient::new(&settings.face_service_url, settings.face_service_timeout())
        .context("Failed to build face service client")?;
    info!("Face service: {}", settings.face_service_url);

    let event_bus = EventBus::new(100);
    let state = AppState::new(db_pool, event_bus, settings, Arc::new(face));
    state
        .resume_pending_generation()
        .await
        .context("Failed to resume pending generation")?;

    let app = rollcall_server::build_router(state.clone());

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Expand a bare level into per-crate directives; full filter strings pass through
fn default_log_filter(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("rollcall_server={level},rollcall_common={level},tower_http={level}")
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
