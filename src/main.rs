//! Pet report gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ cors ─▶ security headers ─▶ parse/sanitize ─▶ identify
//!                                                  │ (public files)
//!                                                  ▼
//!                    routes ◀─ rate limit ◀─ user-agent blocklist
//!                      │
//!                      ├── GET /            welcome envelope
//!                      ├── GET /uploads/*   uploaded files
//!                      └── ANY /v1/users/*  business routes
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use pet_report_gateway::config::load_config;
use pet_report_gateway::lifecycle::{shutdown_signal, Shutdown};
use pet_report_gateway::observability::{logging, metrics};
use pet_report_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "pet-report-gateway")]
#[command(about = "Request boundary for the pet missing report backend", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("pet-report-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
