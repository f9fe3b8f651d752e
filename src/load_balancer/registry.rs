//! Backend registry.
//!
//! # Responsibilities
//! - Hold the live configuration snapshot behind an atomic pointer
//! - Expose the healthy-backend view in configuration order
//! - Provide identity-keyed connection accounting and health updates
//! - Rebuild per-backend state on reload, carrying over shared identities

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::config::LbConfig;
use crate::health::state::HealthState;
use crate::load_balancer::backend::{Backend, BackendState};
use crate::load_balancer::StrategyKind;

/// One immutable generation of configuration plus the backends derived from it.
///
/// Readers load a snapshot once per logical operation and use it throughout,
/// so they never see fields from two different generations.
#[derive(Debug)]
pub struct Snapshot {
    config: Arc<LbConfig>,
    backends: Vec<Arc<Backend>>,
    strategy: StrategyKind,
}

impl Snapshot {
    fn build(config: LbConfig, states: &DashMap<String, Arc<BackendState>>) -> Self {
        let mut backends = Vec::with_capacity(config.backends.len());
        for backend_config in &config.backends {
            let state = states.entry(backend_config.url.clone()).or_default().clone();
            match Backend::with_state(&backend_config.url, backend_config.weight, state) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => {
                    tracing::warn!(
                        url = %backend_config.url,
                        error = %e,
                        "Invalid backend url, skipping"
                    )
                }
            }
        }

        Self {
            strategy: StrategyKind::from_name(&config.strategy),
            config: Arc::new(config),
            backends,
        }
    }

    pub fn config(&self) -> &Arc<LbConfig> {
        &self.config
    }

    /// All backends in configuration order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Backends whose health permits selection, in configuration order.
    pub fn healthy_backends(&self) -> Vec<Arc<Backend>> {
        self.backends.iter().filter(|b| b.is_healthy()).cloned().collect()
    }
}

/// The authoritative, swappable set of backends.
#[derive(Debug)]
pub struct BackendRegistry {
    current: ArcSwap<Snapshot>,
    /// Identity index of per-backend state for the current configuration.
    states: DashMap<String, Arc<BackendState>>,
    /// Serializes reloads; readers never take it.
    reload_lock: Mutex<()>,
}

impl BackendRegistry {
    /// Create a registry from the initial configuration.
    pub fn new(config: LbConfig) -> Self {
        let states = DashMap::new();
        let snapshot = Snapshot::build(config, &states);

        tracing::info!(
            backends = snapshot.backends.len(),
            strategy = ?snapshot.strategy,
            "Backend registry initialized"
        );

        Self {
            current: ArcSwap::from_pointee(snapshot),
            states,
            reload_lock: Mutex::new(()),
        }
    }

    /// Load the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Load the current configuration.
    pub fn config(&self) -> Arc<LbConfig> {
        self.current.load().config.clone()
    }

    pub fn healthy_backends(&self) -> Vec<Arc<Backend>> {
        self.current.load().healthy_backends()
    }

    /// Publish a new configuration.
    ///
    /// Counters and health carry over for URLs present in both the old and the
    /// new list; state for removed URLs is dropped from the index. In-flight
    /// requests keep their old snapshot and finish against it.
    pub fn apply(&self, config: LbConfig) {
        let _reload = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.current.load_full();
        let next = Snapshot::build(config, &self.states);

        let keep: HashSet<String> = next.backends.iter().map(|b| b.url.clone()).collect();
        let removed = previous.backends.iter().filter(|b| !keep.contains(&b.url)).count();
        // URLs are unique within a snapshot, so the rest of `keep` is new.
        let added = keep.len().saturating_sub(previous.backends.len() - removed);

        tracing::info!(
            backends = next.backends.len(),
            added,
            removed,
            strategy = ?next.strategy,
            "Configuration reloaded"
        );

        self.current.store(Arc::new(next));
        self.states.retain(|url, _| keep.contains(url));
    }

    /// Increment the in-flight count for a backend. Unknown ids are ignored.
    pub fn increment_connections(&self, url: &str) {
        if let Some(state) = self.states.get(url) {
            state.inc_connections();
        }
    }

    /// Decrement the in-flight count for a backend. Unknown ids are ignored.
    pub fn decrement_connections(&self, url: &str) {
        if let Some(state) = self.states.get(url) {
            state.dec_connections();
        }
    }

    pub fn connections(&self, url: &str) -> Option<usize> {
        self.states.get(url).map(|s| s.connections())
    }

    pub fn health(&self, url: &str) -> Option<HealthState> {
        self.states.get(url).map(|s| s.health())
    }

    /// Set a backend's health, returning the previous state if the id is known.
    pub fn set_health(&self, url: &str, state: HealthState) -> Option<HealthState> {
        self.states.get(url).map(|s| s.set_health(state))
    }
}
