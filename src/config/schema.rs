//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load balancer.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration snapshot.
///
/// Immutable once loaded. A reload produces a new value that replaces the
/// old one wholesale.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LbConfig {
    /// Backend servers in configuration order.
    pub backends: Vec<BackendConfig>,

    /// Path appended to each backend URL for reachability probes.
    pub health_check_path: String,

    /// Simulated latency in milliseconds (reserved, not applied).
    pub latency_ms: u64,

    /// Probability in `[0.0, 1.0]` that a request is answered with a synthetic 500.
    pub error_rate: f64,

    /// Selection strategy name.
    pub strategy: String,

    /// Sticky-session cookie name (reserved, not applied).
    pub sticky_cookie: String,

    /// Hard deadline for a single forwarding attempt.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Rate limit parameters (reserved, not enforced).
    pub rate_limit: RateLimitConfig,

    /// Listener settings.
    pub server: ServerConfig,

    /// Health monitor timing.
    pub health_monitor: HealthMonitorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for LbConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            health_check_path: String::new(),
            latency_ms: 0,
            error_rate: 0.0,
            strategy: String::new(),
            sticky_cookie: String::new(),
            request_timeout: Duration::from_secs(5),
            max_retries: 0,
            rate_limit: RateLimitConfig::default(),
            server: ServerConfig::default(),
            health_monitor: HealthMonitorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl LbConfig {
    /// Total attempts a single request may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://127.0.0.1:3000"). Also its identity.
    pub url: String,

    /// Weight for weighted round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, weight: u32) -> Self {
        Self {
            url: url.into(),
            weight,
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BucketConfig {
    /// Tokens added per second.
    pub rate: u32,

    /// Bucket capacity.
    pub capacity: u32,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_client: BucketConfig,
    pub per_backend: BucketConfig,
}

impl RateLimitConfig {
    pub fn is_configured(&self) -> bool {
        *self != Self::default()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    pub bind_address: String,

    /// Maximum buffered request body size in bytes. Responses are streamed.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9090".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Time between probe cycles.
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Deadline for a single probe.
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}

/// Durations are written as humantime strings ("2s", "750ms") or as integer milliseconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Millis(ms) => Ok(Duration::from_millis(ms)),
            RawDuration::Text(text) => {
                humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
            }
        }
    }
}
