use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use switchboard::access::AccessGate;
use switchboard::catalog::ProviderCatalog;
use switchboard::config::Config;
use switchboard::llm::ProviderRegistry;
use switchboard::orchestrator::ChatOrchestrator;
use switchboard::server::{self, AppState};
use switchboard::session::SessionRegistry;

// ============================================================================
// CLI Types
// ============================================================================

/// Switchboard - one chat API in front of many LLM providers
#[derive(Parser, Debug)]
#[command(version = switchboard::build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.yaml")]
    config: String,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config).await?;

    // CLI overrides config
    if let Some(host) = cli.host {
        config.server.host = host.to_string();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let providers = ProviderRegistry::new();
    let catalog = ProviderCatalog::load(&config.catalog_path, config.session, &providers).await?;
    info!(
        providers = catalog.len(),
        path = %config.catalog_path.display(),
        "Loaded provider catalog"
    );

    let access = AccessGate::from_config(&config.access).context("invalid access config")?;
    if config.access.require_token && config.access.tokens.is_empty() {
        warn!("Token authentication is required but no tokens are configured");
    }

    let upstream_timeout = match config.server.upstream_timeout_seconds {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let state = AppState {
        chat: ChatOrchestrator::new(Arc::new(catalog), SessionRegistry::new(), upstream_timeout),
        access,
    };

    let app = server::build_app(
        state,
        config.server.request_timeout_seconds,
        config.server.max_body_bytes,
    );

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Starting server");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
