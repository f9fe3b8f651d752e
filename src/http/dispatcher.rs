//! Request dispatch.
//!
//! # Responsibilities
//! - Chaos check, once per request, before any selection
//! - Bounded retry across distinct backends (`max_retries + 1` attempts)
//! - Forward each attempt under its own deadline
//! - Stream the first non-failure response; 502 once the budget is spent
//!
//! # Data Flow
//! ```text
//! Request → load snapshot (once)
//!     → chaos? → 500
//!     → buffer body (413 if over limit)
//!     → for each attempt:
//!         select (strategy over healthy view) → skip if already tried
//!         → build upstream request → send, wait for headers under deadline
//!         → 5xx / transport / timeout: record, next attempt
//!         → anything else: stream to client for the rest of the deadline
//!     → 502
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{request, response, Request};
use axum::response::Response;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::request::build_upstream;
use crate::http::response as reply;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::registry::BackendRegistry;
use crate::load_balancer::Strategies;
use crate::observability::metrics;
use crate::resilience::chaos;
use crate::resilience::retries::{is_failure_status, AttemptError, RequestAttempts};
use crate::resilience::timeouts::{with_attempt_timeout, with_body_deadline};

/// Turns one inbound request into one outbound response.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    strategies: Arc<Strategies>,
    client: Client<HttpConnector, Body>,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            strategies: Arc::new(Strategies::new()),
            client,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Handle one inbound request end to end.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();

        let response = self.handle(request).await;

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn handle(&self, request: Request<Body>) -> Response {
        let snapshot = self.registry.snapshot();
        let config = snapshot.config();

        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        if chaos::should_inject(config.error_rate) {
            metrics::record_chaos();
            tracing::warn!(
                request_id = %request_id,
                error_rate = config.error_rate,
                "Chaos: injecting synthetic error"
            );
            return reply::chaos_error();
        }

        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, config.server.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Rejecting request body");
                return reply::body_too_large();
            }
        };

        tracing::debug!(
            request_id = %request_id,
            method = %parts.method,
            path = %parts.uri.path(),
            "Dispatching request"
        );

        let strategy = self.strategies.get(snapshot.strategy());
        let deadline = config.request_timeout;
        let mut attempts = RequestAttempts::new(config.max_attempts());

        for attempt in attempts.numbers() {
            let selection = match strategy.next_server(&snapshot.healthy_backends()) {
                Ok(selection) => selection,
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        attempt,
                        error = %e,
                        "Backend selection failed"
                    );
                    let e = AttemptError::from(e);
                    metrics::record_attempt(e.outcome());
                    attempts.record_failure(e);
                    continue;
                }
            };

            let Some(backend) = attempts.claim(selection) else {
                tracing::debug!(
                    request_id = %request_id,
                    attempt,
                    "Strategy repeated a tried backend, skipping"
                );
                metrics::record_attempt("repeat");
                continue;
            };

            let attempt_deadline = tokio::time::Instant::now() + deadline;
            let outcome =
                with_attempt_timeout(deadline, self.forward(&parts, &body, &backend, client_ip))
                    .await;

            match outcome {
                Ok((response_parts, incoming)) => {
                    metrics::record_attempt("success");
                    tracing::info!(
                        request_id = %request_id,
                        backend = %backend.url,
                        attempt,
                        status = response_parts.status.as_u16(),
                        "Request forwarded"
                    );
                    let body = with_body_deadline(
                        Body::new(incoming),
                        attempt_deadline,
                        deadline,
                        attempts.into_guards(),
                    );
                    return reply::forwarded(response_parts, body, attempt);
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        backend = %backend.url,
                        attempt,
                        error = %e,
                        "Attempt failed"
                    );
                    metrics::record_attempt(e.outcome());
                    attempts.record_failure(e);
                }
            }
        }

        tracing::error!(
            request_id = %request_id,
            backends_tried = attempts.tried(),
            last_error = ?attempts.last_error(),
            "All backends failed"
        );
        reply::all_backends_failed()
    }

    /// One attempt: send the request and wait for the response head.
    async fn forward(
        &self,
        parts: &request::Parts,
        body: &Bytes,
        backend: &Backend,
        client_ip: Option<IpAddr>,
    ) -> Result<(response::Parts, Incoming), AttemptError> {
        let upstream = build_upstream(parts, body, backend, client_ip)?;

        let response = self
            .client
            .request(upstream)
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = response.status();
        if is_failure_status(status) {
            return Err(AttemptError::Status(status));
        }

        Ok(response.into_parts())
    }
}
