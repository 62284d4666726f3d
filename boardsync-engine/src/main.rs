//! boardsync - proposal board synchronization service
//!
//! `serve` exposes the sync operations over HTTP with an SSE event stream,
//! `sync` runs a single reconcile + materialize pass for one board.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use boardsync_common::config::{database_path, resolve_root_folder, SyncConfig, ROOT_FOLDER_ENV};
use boardsync_common::db::init_database;
use boardsync_common::events::EventBus;
use boardsync_engine::{build_router, AppState, SyncService};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Command-line arguments for boardsync
#[derive(Parser, Debug)]
#[command(name = "boardsync")]
#[command(about = "Keeps proposal-backed boards in sync with their proposals")]
#[command(version)]
struct Cli {
    /// Folder holding the database
    #[arg(short, long, global = true, env = ROOT_FOLDER_ENV)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Sync one board and exit
    Sync {
        #[arg(long)]
        board: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boardsync_engine=info,boardsync_common=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let root_folder = resolve_root_folder(cli.root_folder.as_deref(), ROOT_FOLDER_ENV, true);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let config = SyncConfig::discover().context("Failed to load configuration")?;
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let event_bus = EventBus::new(config.event_capacity);
    let service = Arc::new(SyncService::sqlite(pool, config.clone(), event_bus.clone()));

    match cli.command {
        Command::Sync { board } => {
            let report = service
                .sync_board(board)
                .await
                .with_context(|| format!("Failed to sync board {}", board))?;
            for failure in &report.outcome.failures {
                warn!(proposal_id = %failure.proposal_id, "{}", failure.message);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.port);
            let app = build_router(AppState::new(service, event_bus));

            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("Failed to bind to address")?;
            info!("Listening on http://{}", addr);
            info!("Health check: http://{}/health", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;

            info!("Server shutdown complete");
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
