//! Admission proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ timeout ─▶ CORS ─▶ admission ─▶ forward ─▶ Upstream
//!                                                                 │
//!                                      ┌──────────────────────────┼──────────────────────────┐
//!                                      ▼                          ▼                          ▼
//!                                user agent              rate limiter               authorization
//!                                  filter             (fixed window per           cache ─▶ user store
//!                                                         client id)                (on miss)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use admission_proxy::config::{load_config, GatewayConfig};
use admission_proxy::lifecycle::{signals, startup, Shutdown};
use admission_proxy::observability::{logging, metrics};
use admission_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "admission-proxy")]
#[command(about = "Rate limiting and authorization gate in front of an upstream API")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("admission-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        allowed_user_agents = config.user_agents.allowed.len(),
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

    let store = startup::build_store(&config.store);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, store);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
