//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server (identity URL + weight)
//! - Track active connections (for Least Connections LB)
//! - Track health state (Unknown/Healthy/Unhealthy)
//!
//! A `Backend` is immutable and belongs to one configuration snapshot. Its
//! mutable `BackendState` is shared by identity across snapshots, so a reload
//! that keeps a URL also keeps its counters and health.

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

use crate::health::state::HealthState;

/// Mutable per-backend state.
#[derive(Debug)]
pub struct BackendState {
    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    health: AtomicU8,
    /// Number of requests currently in flight to this backend.
    active_connections: AtomicUsize,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            health: AtomicU8::new(HealthState::Unknown as u8),
            active_connections: AtomicUsize::new(0),
        }
    }
}

impl BackendState {
    pub fn health(&self) -> HealthState {
        HealthState::from(self.health.load(Ordering::Acquire))
    }

    /// Store a new health state, returning the previous one.
    pub fn set_health(&self, state: HealthState) -> HealthState {
        HealthState::from(self.health.swap(state as u8, Ordering::AcqRel))
    }

    /// Get the current number of active connections.
    pub fn connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement active connection count. Never goes below zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Configured URL, also the backend's identity.
    pub url: String,
    /// Pre-parsed base URL for building upstream requests.
    pub base_url: Url,
    /// Weight for weighted round-robin.
    pub weight: u32,
    state: Arc<BackendState>,
}

impl Backend {
    /// Create a backend with fresh state.
    pub fn new(url: &str, weight: u32) -> Result<Self, url::ParseError> {
        Self::with_state(url, weight, Arc::default())
    }

    /// Create a backend that shares existing state.
    pub fn with_state(
        url: &str,
        weight: u32,
        state: Arc<BackendState>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: url.to_string(),
            base_url: Url::parse(url)?,
            weight,
            state,
        })
    }

    pub fn state(&self) -> &Arc<BackendState> {
        &self.state
    }

    /// Return true if backend may receive traffic (Healthy or Unknown).
    pub fn is_healthy(&self) -> bool {
        self.state.health().is_routable()
    }

    /// Get the current number of active connections.
    pub fn connections(&self) -> usize {
        self.state.connections()
    }

    /// Increment the connection count and return a guard that undoes it on drop.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.state.inc_connections();
        ConnectionGuard {
            backend: self.clone(),
        }
    }
}

/// A RAII guard that manages the active connection count.
///
/// Exactly one decrement happens per guard, whichever path drops it.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl Deref for ConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend.state.dec_connections();
    }
}
