//! crmflow-dedup - Contact duplicate resolution action
//!
//! Finds CRM contacts sharing a dedup key (phone number by default), scores
//! each by email quality, and merges all duplicates into the best, oldest
//! record.
//!
//! Runs either as an HTTP service receiving workflow events (`serve`) or as
//! a one-shot command (`run --key <value>`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crmflow_common::config::{load_toml_config, resolve_config_path};
use tokio::signal;
use tracing::info;

use crmflow_dedup::config::{DedupConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use crmflow_dedup::{api, AppState, DedupPipeline};

/// Command-line arguments for crmflow-dedup
#[derive(Parser, Debug)]
#[command(name = "crmflow-dedup")]
#[command(about = "Duplicate contact resolution workflow action")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve workflow actions over HTTP (default)
    Serve {
        /// Port to listen on (overrides [server] port)
        #[arg(short, long, env = "CRMFLOW_DEDUP_PORT")]
        port: Option<u16>,

        /// Address to bind (overrides [server] host)
        #[arg(long)]
        host: Option<String>,
    },
    /// Resolve duplicates for a single key and print the action output
    Run {
        /// Dedup key value (e.g. a phone number)
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME);
    let (config, config_source): (DedupConfig, _) =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    crmflow_common::logging::init(&config.logging).context("Failed to initialize logging")?;

    info!("Starting crmflow-dedup");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    config.validate().context("Invalid configuration")?;
    let credentials = config
        .resolve_credentials()
        .context("Failed to resolve credentials")?;

    let pipeline = Arc::new(
        DedupPipeline::from_config(&config, credentials)
            .context("Failed to initialize dedup pipeline")?,
    );

    match args.command.unwrap_or(Command::Serve {
        port: None,
        host: None,
    }) {
        Command::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve(pipeline, &config, &host, port).await
        }
        Command::Run { key } => run_once(pipeline, &key).await,
    }
}

async fn serve(
    pipeline: Arc<DedupPipeline>,
    config: &DedupConfig,
    host: &str,
    port: u16,
) -> Result<()> {
    let state = AppState::new(pipeline, config.hubspot.dedup_property.clone());
    let app = crmflow_dedup::build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

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
    Ok(())
}

async fn run_once(pipeline: Arc<DedupPipeline>, key: &str) -> Result<()> {
    let report = pipeline
        .run(Some(key))
        .await
        .context("Dedup run aborted")?;

    let response = api::report_response(&report);
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to render output")?
    );
    Ok(())
}

/// Graceful shutdown signal handler
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
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
