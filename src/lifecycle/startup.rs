//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order
//! - Start background tasks (config reload, health checks, metrics)
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fatal: unreadable or invalid initial config, watcher setup, listener bind
//! - Non-fatal: metrics exporter failures (logged)
//! - Listener starts last (traffic only when ready)
//! - Background tasks are joined before returning

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::watcher::{ConfigReloader, ConfigWatcher};
use crate::config::{load_config, ConfigError, ObservabilityConfig};
use crate::health::HealthMonitor;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::load_balancer::registry::BackendRegistry;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start config watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start every subsystem and serve until `shutdown` fires.
pub async fn run(config_path: &Path, shutdown: &Shutdown) -> Result<(), StartupError> {
    let config = load_config(config_path)?;
    tracing::info!(
        path = %config_path.display(),
        backends = config.backends.len(),
        strategy = %config.strategy,
        max_retries = config.max_retries,
        request_timeout = ?config.request_timeout,
        "Configuration loaded"
    );

    let bind_address = config.server.bind_address.clone();
    let observability = config.observability.clone();
    let monitor_config = config.health_monitor;
    let registry = Arc::new(BackendRegistry::new(config));

    // Dropping the handle stops the watch, so it lives until we return.
    let (watcher, updates) = ConfigWatcher::new(config_path);
    let _watcher = watcher.run()?;
    let reloader = ConfigReloader::new(registry.clone(), updates);
    let reloader = tokio::spawn(reloader.run(shutdown.subscribe()));

    start_metrics(&observability);

    let monitor = HealthMonitor::new(registry.clone(), monitor_config);
    let monitor = tokio::spawn(monitor.run(shutdown.subscribe()));

    let served = match TcpListener::bind(&bind_address).await {
        Ok(listener) => HttpServer::new(registry)
            .run(listener, shutdown.subscribe())
            .await
            .map_err(StartupError::Serve),
        Err(source) => Err(StartupError::Bind {
            address: bind_address,
            source,
        }),
    };

    shutdown.trigger();
    for task in [reloader, monitor] {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }

    served
}

fn start_metrics(config: &ObservabilityConfig) {
    if !config.metrics_enabled {
        return;
    }

    match config.metrics_address.parse::<SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics exporter");
            }
        }
        Err(e) => tracing::error!(
            metrics_address = %config.metrics_address,
            error = %e,
            "Failed to parse metrics address"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&dir.path().join("absent.yaml"), &Shutdown::new()).await;
        assert!(matches!(result, Err(StartupError::Config(ConfigError::Io(_)))));
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "backends:\n  - url: \"ftp://nope\"\nerror_rate: 3.0\n");
        let result = run(&path, &Shutdown::new()).await;
        assert!(matches!(result, Err(StartupError::Config(ConfigError::Validation(_)))));
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "server:\n  bind_address: \"not an address\"\n");
        let result = run(&path, &Shutdown::new()).await;
        assert!(matches!(result, Err(StartupError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            concat!(
                "backends:\n  - url: \"http://127.0.0.1:1\"\n",
                "server:\n  bind_address: \"127.0.0.1:0\"\n",
            ),
        );
        let shutdown = Shutdown::new();

        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { run(&path, &shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("startup::run did not return after shutdown")
            .unwrap();
        assert!(result.is_ok());
    }
}
