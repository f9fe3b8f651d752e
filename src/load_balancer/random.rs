//! Random selection strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{backend::Backend, LoadBalancer, SelectError, Selection};

/// Uniform pick among healthy backends. Stateless.
#[derive(Debug, Default)]
pub struct RandomSelect;

impl RandomSelect {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomSelect {
    fn next_server(&self, healthy: &[Arc<Backend>]) -> Result<Selection, SelectError> {
        if healthy.is_empty() {
            return Err(SelectError::NoHealthyBackend);
        }
        let index = rand::thread_rng().gen_range(0..healthy.len());
        Ok(Selection::untracked(healthy[index].clone()))
    }
}
