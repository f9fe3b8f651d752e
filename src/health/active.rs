//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend of the current snapshot
//! - Update backend health state based on results

use std::sync::Arc;

use axum::body::Body;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthMonitorConfig;
use crate::health::probe::{health_url, probe};
use crate::health::state::{log_transition, HealthState};
use crate::load_balancer::registry::BackendRegistry;
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    config: HealthMonitorConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>, config: HealthMonitorConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            config,
            client,
        }
    }

    /// Probe on every tick until shutdown. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.config.interval,
            timeout = ?self.config.timeout,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one probe cycle over the current snapshot.
    ///
    /// Probes run concurrently and each backend's state is updated as soon as
    /// its own probe finishes.
    pub async fn check_all(&self) {
        let snapshot = self.registry.snapshot();
        let path = snapshot.config().health_check_path.as_str();
        let timeout = self.config.timeout;

        let probes = snapshot.backends().iter().map(|backend| async move {
            let url = health_url(&backend.url, path);
            let result = probe(&self.client, &url, timeout).await;
            if let Err(e) = &result {
                tracing::debug!(backend = %backend.url, error = %e, "Health check failed");
            }

            let next = HealthState::from_probe(result.is_ok());
            let previous = backend.state().set_health(next);
            log_transition(&backend.url, previous, next);
            metrics::record_backend_health(&backend.url, next == HealthState::Healthy);
        });

        join_all(probes).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    use super::*;
    use crate::config::{BackendConfig, LbConfig};
    use crate::lifecycle::Shutdown;

    async fn toggled_backend(up: Arc<AtomicBool>) -> String {
        let app = Router::new().route(
            "/health",
            get(move || {
                let up = up.clone();
                async move {
                    if up.load(Ordering::SeqCst) {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn monitor_config() -> HealthMonitorConfig {
        HealthMonitorConfig {
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_eviction_and_reinclusion() {
        let up = Arc::new(AtomicBool::new(true));
        let url = toggled_backend(up.clone()).await;
        let registry = Arc::new(BackendRegistry::new(LbConfig {
            backends: vec![BackendConfig::new(url.clone(), 1)],
            health_check_path: "/health".into(),
            ..LbConfig::default()
        }));
        let monitor = HealthMonitor::new(registry.clone(), monitor_config());

        monitor.check_all().await;
        assert_eq!(registry.health(&url), Some(HealthState::Healthy));

        up.store(false, Ordering::SeqCst);
        monitor.check_all().await;
        assert_eq!(registry.health(&url), Some(HealthState::Unhealthy));
        assert!(registry.healthy_backends().is_empty());

        up.store(true, Ordering::SeqCst);
        monitor.check_all().await;
        assert_eq!(registry.healthy_backends().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_probe_does_not_delay_others() {
        let up = Arc::new(AtomicBool::new(true));
        let fast = toggled_backend(up).await;

        // Accepts connections but never answers.
        let black_hole = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let slow = format!("http://{}", black_hole.local_addr().unwrap());

        let registry = Arc::new(BackendRegistry::new(LbConfig {
            backends: vec![
                BackendConfig::new(slow.clone(), 1),
                BackendConfig::new(fast.clone(), 1),
            ],
            health_check_path: "/health".into(),
            ..LbConfig::default()
        }));
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            HealthMonitorConfig {
                interval: Duration::from_secs(60),
                timeout: Duration::from_secs(2),
            },
        ));

        let cycle = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_all().await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(registry.health(&fast), Some(HealthState::Healthy));
        assert_eq!(registry.health(&slow), Some(HealthState::Unknown));

        cycle.await.unwrap();
        assert_eq!(registry.health(&slow), Some(HealthState::Unhealthy));
        drop(black_hole);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let registry = Arc::new(BackendRegistry::new(LbConfig::default()));
        let monitor = HealthMonitor::new(registry, monitor_config());
        let shutdown = Shutdown::new();

        let task = tokio::spawn(monitor.run(shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
