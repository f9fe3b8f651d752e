//! Backend health state machine.
//!
//! # States
//! - Unknown: not probed yet; still receives traffic
//! - Healthy: last probe answered 200
//! - Unhealthy: last probe failed; excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Unknown → Healthy | Unhealthy   (first probe)
//! Healthy ←→ Unhealthy            (every later probe)
//! ```
//!
//! # Design Decisions
//! - No hysteresis: each probe cycle decides the state outright
//! - State changes logged for observability

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl HealthState {
    /// State after a probe with the given outcome.
    pub fn from_probe(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }

    /// Whether a backend in this state may be selected.
    pub fn is_routable(self) -> bool {
        self != HealthState::Unhealthy
    }
}

/// Log a transition if the state actually changed. Returns true on change.
pub fn log_transition(backend: &str, previous: HealthState, next: HealthState) -> bool {
    if previous == next {
        return false;
    }
    match next {
        HealthState::Unhealthy => {
            tracing::warn!(backend = %backend, from = ?previous, "Backend marked unhealthy")
        }
        _ => tracing::info!(
            backend = %backend,
            from = ?previous,
            to = ?next,
            "Backend health changed"
        ),
    }
    true
}
