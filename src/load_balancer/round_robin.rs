//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer, SelectError, Selection};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends; each call advances
/// the cursor and then picks the slot after the previous one.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, healthy: &[Arc<Backend>]) -> Result<Selection, SelectError> {
        if healthy.is_empty() {
            return Err(SelectError::NoHealthyBackend);
        }

        // The modulus uses the length seen by this call, so a view that
        // shrank since the last call is fine.
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let index = cursor % healthy.len();
        Ok(Selection::untracked(healthy[index].clone()))
    }
}
