mod config;
mod errors;
mod health;
mod logging;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::logging::LoggingContext;
use crate::routes::build_router;
use crate::state::AppState;

/// Resume Tailor API server.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Address to bind (overrides APP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides APP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Env file to load instead of ./.env
    #[arg(long, env = "APP_ENV_FILE")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration and logging errors are fatal: never serve half-configured.
    let mut settings = match &cli.env_file {
        Some(path) => Settings::from_env_file(path)?,
        None => Settings::from_env()?,
    };
    if let Some(host) = cli.host {
        settings.app.host = host;
    }
    if let Some(port) = cli.port {
        settings.app.port = port;
    }
    let warnings = settings.validate()?;

    let logging = LoggingContext::new(&settings.logging)?;
    logging.install_global()?;
    let logging = Arc::new(Mutex::new(logging));
    #[cfg(unix)]
    tokio::spawn(reload_logging_on_hangup(
        Arc::clone(&logging),
        cli.env_file.clone(),
    ));

    info!(
        "Starting {} v{} ({})",
        settings.app.name, settings.app.version, settings.app.environment
    );
    for warning in &warnings {
        warn!("Configuration warning: {warning}");
    }

    let listener = tokio::net::TcpListener::bind((settings.app.host.as_str(), settings.app.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                settings.app.host, settings.app.port
            )
        })?;
    info!("Listening on {}", listener.local_addr()?);

    let app = build_router(AppState::new(settings));

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!(critical = true, "Server terminated: {e}");
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

/// SIGHUP re-reads the environment and swaps the log sinks. Other settings
/// need a restart.
#[cfg(unix)]
async fn reload_logging_on_hangup(logging: Arc<Mutex<LoggingContext>>, env_file: Option<PathBuf>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(signal) => signal,
        Err(e) => {
            warn!("Failed to listen for SIGHUP: {e}");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        let result = Settings::reload(env_file.as_deref())
            .map_err(anyhow::Error::from)
            .and_then(|settings| {
                let mut ctx = logging.lock().unwrap_or_else(PoisonError::into_inner);
                ctx.reconfigure(&settings.logging).map_err(anyhow::Error::from)
            });

        match result {
            Ok(()) => info!("Logging reconfigured after SIGHUP"),
            Err(e) => error!("Failed to reload logging configuration: {e:#}"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
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
                warn!("Failed to listen for SIGTERM: {e}");
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

    info!("Shutdown signal received, draining connections");
}
