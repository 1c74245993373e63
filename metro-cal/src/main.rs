//! metro-cal - calibration control service
//!
//! Serves the calibration HTTP API and runs the monthly reminder sweep.

use anyhow::{Context, Result};
use clap::Parser;
use metro_common::config::{self, ROOT_FOLDER_ENV};
use metro_common::db::init_database;
use metro_cal::services::dispatch_client::HttpDispatcher;
use metro_cal::services::notification::{spawn_monthly_schedule, NotificationJob, SenderIdentity};
use metro_cal::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "metro-cal", version, about = "Calibration control service")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "METRO_CAL_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Database file (overrides the configured location)
    #[arg(short, long, env = "METRO_CAL_DATABASE")]
    database: Option<PathBuf>,

    /// Port to listen on (overrides the configured port)
    #[arg(short, long, env = "METRO_CAL_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = config::load_bootstrap_config(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting metro-cal v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| toml_config.database_path(&root_folder));
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let mut state = AppState::new(pool.clone());

    let dispatch = &toml_config.dispatch;
    match dispatch.endpoint() {
        Some(endpoint) => {
            let token = dispatch.resolve_token();
            if token.is_none() {
                warn!("No dispatch token configured, reminder batches are sent unauthenticated");
            }
            let dispatcher = HttpDispatcher::new(
                endpoint,
                token,
                Duration::from_secs(dispatch.timeout_secs),
            )?;
            let job = Arc::new(NotificationJob::new(
                pool.clone(),
                Arc::new(dispatcher),
                SenderIdentity {
                    name: dispatch.sender_name.clone(),
                    address: dispatch.sender_address.clone(),
                },
            ));

            if toml_config.notifications.enabled {
                spawn_monthly_schedule(Arc::clone(&job));
            } else {
                info!("Monthly reminder schedule disabled, manual trigger only");
            }

            info!("Reminder dispatch endpoint: {}", endpoint);
            state = state.with_reminders(job);
        }
        None => warn!("No dispatch endpoint configured, calibration reminders disabled"),
    }

    let app = build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr = format!("{}:{}", toml_config.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("metro-cal listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("metro-cal stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
