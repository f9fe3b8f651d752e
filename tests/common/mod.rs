//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use lb_proxy::{BackendRegistry, HttpServer, LbConfig, Shutdown};
use tokio::net::TcpListener;

/// A mock backend whose status can be changed while it runs.
///
/// Every request outside `/health` bumps `hits` and answers with the current
/// `status` and the body `name`. `/health` answers with `health_status`.
#[derive(Clone)]
pub struct MockBackend {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    status: Arc<AtomicU16>,
    health_status: Arc<AtomicU16>,
}

impl MockBackend {
    pub async fn start(name: &'static str, status: u16) -> Self {
        Self::start_with_delay(name, status, Duration::ZERO).await
    }

    pub async fn start_with_delay(name: &'static str, status: u16, delay: Duration) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let status = Arc::new(AtomicU16::new(status));
        let health_status = Arc::new(AtomicU16::new(200));

        let app = {
            let hits = hits.clone();
            let status = status.clone();
            let health_status = health_status.clone();
            Router::new()
                .route(
                    "/health",
                    get(move || {
                        let health_status = health_status.clone();
                        async move { code(health_status.load(Ordering::SeqCst)) }
                    }),
                )
                .fallback(move || {
                    let hits = hits.clone();
                    let status = status.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        (code(status.load(Ordering::SeqCst)), name)
                    }
                })
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            hits,
            status,
            health_status,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn set_health(&self, status: u16) {
        self.health_status.store(status, Ordering::SeqCst);
    }
}

fn code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// A load balancer serving on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<BackendRegistry>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub async fn start(config: LbConfig) -> Self {
        let registry = Arc::new(BackendRegistry::new(config));
        let shutdown = Shutdown::new();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(registry.clone());
        tokio::spawn(server.run(listener, shutdown.subscribe()));

        Self {
            addr,
            registry,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Write a config file into `dir` and return its path.
pub fn write_config(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Replace a file's contents in one step so watchers never see a partial write.
pub fn replace_file(path: &std::path::Path, body: &str) {
    let staging = path.with_extension("staging");
    std::fs::write(&staging, body).unwrap();
    std::fs::rename(&staging, path).unwrap();
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
