//! Configuration file watcher for hot reload.
//!
//! The watcher runs on notify's thread and only parses; the reloader task owns
//! publishing into the registry so that a reload never races another one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::LbConfig;
use crate::config::validation::validate_reload;
use crate::load_balancer::registry::BackendRegistry;
use crate::observability::metrics;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<LbConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<LbConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors which replace the file by rename are still observed. The
    /// returned handle must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let file_name = path.file_name().map(OsString::from);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(OsString::from) == file_name);
                    if !touches_config {
                        return;
                    }

                    tracing::info!(path = ?path, "Config file change detected, reloading...");
                    match reload_config(&path) {
                        Ok(new_config) => {
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            metrics::record_config_reload(false);
                            tracing::error!(
                                error = %e,
                                "Failed to reload config. Keeping current configuration."
                            );
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_root(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load a replacement configuration.
///
/// Stricter than startup: a file that parses to an empty backend list (a
/// truncated write, say) is rejected so the running pool is kept.
pub fn reload_config(path: &Path) -> Result<LbConfig, ConfigError> {
    let config = load_config(path)?;
    validate_reload(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn watch_root(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Applies parsed configuration updates to the registry until shutdown.
pub struct ConfigReloader {
    registry: Arc<BackendRegistry>,
    updates: mpsc::UnboundedReceiver<LbConfig>,
}

impl ConfigReloader {
    pub fn new(registry: Arc<BackendRegistry>, updates: mpsc::UnboundedReceiver<LbConfig>) -> Self {
        Self { registry, updates }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                update = self.updates.recv() => {
                    let Some(config) = update else {
                        tracing::debug!("Config update channel closed");
                        break;
                    };
                    self.registry.apply(config);
                    metrics::record_config_reload(true);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Config reloader received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
