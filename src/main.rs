//! radix-router service.
//!
//! Serves the routes of a TOML configuration file through the radix-tree
//! dispatcher.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (request id, trace, timeout)
//!                         │
//!                         ▼
//!                     dispatcher ──▶ radix tree lookup
//!                         │
//!            ┌────────────┼──────────────┬───────────┐
//!            ▼            ▼              ▼           ▼
//!         handler     301/308        405 + Allow    404
//!                     redirect
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use radix_router::config::{load_config, ConfigWatcher, ServerConfig};
use radix_router::http::HttpServer;
use radix_router::lifecycle::{signals, Shutdown};
use radix_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "radix-router", version)]
#[command(about = "HTTP router service backed by a radix tree", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,

    /// Reload routes when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    if cli.check {
        println!(
            "configuration OK: {} routes, {} file mounts",
            config.routes.len(),
            config.files.len()
        );
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!("radix-router v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        file_mounts = config.files.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Keeps the file watch alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
