//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend identities (parseable, unique URLs)
//! - Validate value ranges (error rate, timeouts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, on startup and on reload
//! - A reload must also keep at least one backend; startup may begin empty

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::LbConfig;
use crate::load_balancer::StrategyKind;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend url {url:?} is invalid: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("backend url {0:?} is listed more than once")]
    DuplicateBackend(String),

    #[error("error_rate {0} must be within 0.0..=1.0")]
    ErrorRateOutOfRange(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("health_check_path {0:?} must start with '/'")]
    InvalidHealthPath(String),

    #[error("backends list is empty")]
    NoBackends,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for backend in &config.backends {
        if let Err(reason) = check_backend_url(&backend.url) {
            errors.push(ValidationError::InvalidBackendUrl {
                url: backend.url.clone(),
                reason,
            });
        }
        if !seen.insert(backend.url.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.url.clone()));
        }
    }

    if !config.error_rate.is_finite() || !(0.0..=1.0).contains(&config.error_rate) {
        errors.push(ValidationError::ErrorRateOutOfRange(config.error_rate.to_string()));
    }

    if config.request_timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("request_timeout"));
    }
    if config.health_monitor.interval.is_zero() {
        errors.push(ValidationError::ZeroDuration("health_monitor.interval"));
    }
    if config.health_monitor.timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("health_monitor.timeout"));
    }

    if !config.health_check_path.is_empty() && !config.health_check_path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(config.health_check_path.clone()));
    }

    if errors.is_empty() {
        warn_on_soft_issues(config);
        Ok(())
    } else {
        Err(errors)
    }
}

/// Extra checks for a configuration replacing a running one.
pub fn validate_reload(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    if config.backends.is_empty() {
        return Err(vec![ValidationError::NoBackends]);
    }
    Ok(())
}

fn check_backend_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

/// Things that are accepted but worth telling the operator about.
fn warn_on_soft_issues(config: &LbConfig) {
    if StrategyKind::parse(&config.strategy).is_none() {
        tracing::warn!(
            strategy = %config.strategy,
            "Unknown strategy, falling back to round-robin"
        );
    }
    if config.backends.is_empty() {
        tracing::warn!("Configuration lists no backends; every request will fail with 502");
    }
    let reserved = config.latency_ms > 0
        || !config.sticky_cookie.is_empty()
        || config.rate_limit.is_configured();
    if reserved {
        tracing::info!(
            latency_ms = config.latency_ms,
            sticky_cookie = %config.sticky_cookie,
            rate_limit = ?config.rate_limit,
            "Reserved settings present; they are not enforced"
        );
    }
}
