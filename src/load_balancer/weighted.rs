//! Weighted round-robin load balancing strategy.
//!
//! Each healthy backend appears `weight` times in an expanded sequence and the
//! cursor walks that sequence, advancing before each pick. Zero-weight
//! backends never appear.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer, SelectError, Selection};

#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    counter: AtomicUsize,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, healthy: &[Arc<Backend>]) -> Result<Selection, SelectError> {
        let total: usize = healthy.iter().map(|b| b.weight as usize).sum();
        if total == 0 {
            return Err(SelectError::NoWeightedBackend);
        }

        // Walk the cumulative weights instead of materializing the expansion.
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let mut slot = cursor % total;
        for backend in healthy {
            let weight = backend.weight as usize;
            if slot < weight {
                return Ok(Selection::untracked(backend.clone()));
            }
            slot -= weight;
        }
        Err(SelectError::NoWeightedBackend)
    }
}
