//! mcp-serve binary: the tea catalog over stdio or HTTP/SSE.

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mcp_serve::config::{Args, Config, Transport as TransportKind};
use mcp_serve::error::{Error, Result};
use mcp_serve::http::HttpTransport;
use mcp_serve::mcp::{McpServer, StdioTransport, Transport};
use mcp_serve::service::TeaHandler;
use mcp_serve::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Build configuration from args
    let config: Config = args.into();
    config.validate()?;

    init_logging(&config)?;

    info!("{} v{} (mcp-serve {})", config.name, config.server_version, VERSION);
    info!("Transport: {:?}", config.transport);

    let server = Arc::new(
        McpServer::from_handler(
            config.name.clone(),
            config.server_version.clone(),
            Arc::new(TeaHandler::new()),
        )
        .with_request_timeout(config.request_timeout()),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let transport: Box<dyn Transport> = match config.transport {
        TransportKind::Stdio => Box::new(StdioTransport::stdio()),
        TransportKind::Http => Box::new(HttpTransport::new(config.http_config())),
    };

    transport.start(server, cancel.clone()).await?;
    info!("MCP server stopped");

    // A blocked stdin read would otherwise hold up runtime shutdown.
    if cancel.is_cancelled() && config.transport == TransportKind::Stdio {
        std::process::exit(0);
    }

    Ok(())
}

/// Logs always go to stderr; stdout carries the stdio transport.
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::Config(format!("failed to initialize logging: {}", e)))
}

/// Cancel `cancel` on ctrl-c or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    cancel.cancel();
}
