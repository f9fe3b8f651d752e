//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives → dispatcher loads registry snapshot
//!     → registry.rs (healthy backends, config order)
//!     → Apply load balancing algorithm (named by config):
//!         - round_robin.rs (rotate through backends)
//!         - weighted.rs (rotate through weight-expanded backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!         - random.rs (uniform pick)
//!     → Return selected backend (+ connection guard for least-conn)
//! ```
//!
//! # Design Decisions
//! - Strategies only see the healthy view; an empty view is an explicit error
//! - Each strategy instance owns its cursor; instances outlive reloads
//! - Least-conn selection and accounting happen together

use std::sync::Arc;

use thiserror::Error;

pub mod backend;
pub mod least_conn;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod weighted;

use backend::{Backend, ConnectionGuard};
use least_conn::LeastConnections;
use random::RandomSelect;
use round_robin::RoundRobin;
use weighted::WeightedRoundRobin;

/// Why a strategy could not produce a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("no healthy backends with valid weights")]
    NoWeightedBackend,
}

/// A selected target.
#[derive(Debug)]
pub struct Selection {
    pub backend: Arc<Backend>,
    /// Present when the strategy counted this selection as a connection.
    pub guard: Option<ConnectionGuard>,
}

impl Selection {
    pub fn untracked(backend: Arc<Backend>) -> Self {
        Self { backend, guard: None }
    }
}

/// A backend selection algorithm over the healthy view.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, healthy: &[Arc<Backend>]) -> Result<Selection, SelectError>;
}

/// Strategy named by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    Random,
}

impl StrategyKind {
    /// Parse a strategy name; `None` for unrecognized names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "roundrobin" | "round_robin" | "round-robin" => Some(StrategyKind::RoundRobin),
            "weighted" | "weighted_round_robin" | "weighted-round-robin" => {
                Some(StrategyKind::WeightedRoundRobin)
            }
            "leastconn" | "least_connections" | "least-conn" => {
                Some(StrategyKind::LeastConnections)
            }
            "random" => Some(StrategyKind::Random),
            _ => None,
        }
    }

    /// Resolve a strategy name, falling back to round-robin.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }
}

/// One long-lived instance of every strategy.
#[derive(Debug, Default)]
pub struct Strategies {
    round_robin: RoundRobin,
    weighted: WeightedRoundRobin,
    least_conn: LeastConnections,
    random: RandomSelect,
}

impl Strategies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: StrategyKind) -> &dyn LoadBalancer {
        match kind {
            StrategyKind::RoundRobin => &self.round_robin,
            StrategyKind::WeightedRoundRobin => &self.weighted,
            StrategyKind::LeastConnections => &self.least_conn,
            StrategyKind::Random => &self.random,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!(StrategyKind::from_name("leastconn"), StrategyKind::LeastConnections);
        assert_eq!(StrategyKind::from_name("Weighted"), StrategyKind::WeightedRoundRobin);
        assert_eq!(StrategyKind::from_name("random"), StrategyKind::Random);
        assert_eq!(StrategyKind::from_name(""), StrategyKind::RoundRobin);
        assert_eq!(StrategyKind::parse("fastest"), None);
        assert_eq!(StrategyKind::from_name("fastest"), StrategyKind::RoundRobin);
    }

    #[test]
    fn test_every_strategy_rejects_empty_view() {
        let strategies = Strategies::new();
        for kind in [
            StrategyKind::RoundRobin,
            StrategyKind::WeightedRoundRobin,
            StrategyKind::LeastConnections,
            StrategyKind::Random,
        ] {
            assert!(strategies.get(kind).next_server(&[]).is_err(), "{kind:?}");
        }
    }

    #[test]
    fn test_cursors_are_per_strategy() {
        let strategies = Strategies::new();
        let pool = test_support::backends(&[("http://a:1", 1), ("http://b:1", 1)]);

        let rr = strategies.get(StrategyKind::RoundRobin);
        let wrr = strategies.get(StrategyKind::WeightedRoundRobin);

        assert_eq!(rr.next_server(&pool).unwrap().backend.url, "http://a:1");
        // Weighted rotation starts from its own cursor, unaffected by round-robin.
        assert_eq!(wrr.next_server(&pool).unwrap().backend.url, "http://a:1");
        assert_eq!(rr.next_server(&pool).unwrap().backend.url, "http://b:1");
        assert_eq!(wrr.next_server(&pool).unwrap().backend.url, "http://b:1");
    }
}
