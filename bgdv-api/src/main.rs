//! Bike geometry validator (bgdv-api) - Main entry point
//!
//! Serves `POST /validation` and `GET /health`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bgdv_api::{build_router, AppState};
use bgdv_common::config::LoggingConfig;
use bgdv_common::TomlConfig;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bgdv-api
#[derive(Parser, Debug)]
#[command(name = "bgdv-api")]
#[command(about = "Bike geometry normalisation and validation service")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "BGDV_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overrides [server] host
    #[arg(long, env = "BGDV_HOST")]
    host: Option<String>,

    /// Port to listen on, overrides [server] port
    #[arg(short, long, env = "BGDV_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_path) =
        TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _guard = init_tracing(&config.logging)?;

    info!(
        "Starting bgdv-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BGDV_GIT_HASH"),
        env!("BGDV_BUILT_AT"),
        env!("BGDV_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let state = AppState::from_config(&config).context("Failed to load reference data")?;
    info!(
        "Reference data: {} validatable parameters",
        state.validator.reference().total_validatable()
    );
    info!("Validation defaults: {:?}", state.validator.defaults());
    info!("Solver settings: {:?}", state.validator.finder().settings());

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("bgdv-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `[logging] level`. With `[logging] file` set, events
/// are appended to that file instead of stderr; the returned guard flushes it
/// on drop.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=debug", logging.level).into());

    match &logging.file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;

            let appender = tracing_appender::rolling::never(
                directory.unwrap_or_else(|| std::path::Path::new(".")),
                file_name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Ok(None)
        }
    }
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
            Ok(mut stream) => {
                stream.recv().await;
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
