//! HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ http::dispatcher ──▶ load_balancer ──▶ Backend
//!                    (request id,     (chaos, retry,       (strategy over
//!                     tracing)         per-attempt          healthy view)
//!                                      deadline)
//!
//!     Background:  health::active (periodic probes → backend health)
//!                  config::watcher (file change → new registry snapshot)
//!                  lifecycle (signals → shutdown broadcast)
//! ```

use std::path::PathBuf;

use clap::Parser;

use lb_proxy::lifecycle::{signals, startup, Shutdown};
use lb_proxy::observability::logging::{self, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "lb-proxy",
    version,
    about = "HTTP load balancer with health checks and hot reload"
)]
struct Cli {
    /// Path to the YAML or TOML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log output format (pretty or json)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lb-proxy starting");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_shutdown(shutdown.clone()));

    if let Err(e) = startup::run(&cli.config, &shutdown).await {
        tracing::error!(error = %e, "Fatal error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
