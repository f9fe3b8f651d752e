//! Backend reachability probe.
//!
//! A single timed GET. Only `200 OK` counts as reachable.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use thiserror::Error;
use tokio::time;

/// Why a probe classified a backend as unhealthy.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("backend URL is empty")]
    EmptyUrl,

    #[error("invalid health check url {0:?}")]
    InvalidUrl(String),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("received {0}")]
    Status(StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Join a backend base URL and the configured health check path.
pub fn health_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Probe `url` once, bounded by `timeout`.
pub async fn probe(
    client: &Client<HttpConnector, Body>,
    url: &str,
    timeout: Duration,
) -> Result<(), ProbeError> {
    if url.is_empty() {
        return Err(ProbeError::EmptyUrl);
    }
    let uri: Uri = url.parse().map_err(|_| ProbeError::InvalidUrl(url.to_string()))?;

    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::USER_AGENT, "lb-proxy-health-check")
        .body(Body::empty())
        .map_err(|_| ProbeError::InvalidUrl(url.to_string()))?;

    match time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) if response.status() == StatusCode::OK => Ok(()),
        Ok(Ok(response)) => Err(ProbeError::Status(response.status())),
        Ok(Err(e)) => Err(ProbeError::Unreachable(e.to_string())),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
