//! Least Connections load balancing strategy.

use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::{backend::Backend, LoadBalancer, SelectError, Selection};

/// Least connections selector.
/// Selects the backend with the minimum number of active connections and
/// counts the selection as a new connection before returning.
#[derive(Debug, Default)]
pub struct LeastConnections {
    /// Makes "find minimum, then increment" one step across callers.
    select_lock: Mutex<()>,
}

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, healthy: &[Arc<Backend>]) -> Result<Selection, SelectError> {
        let _select = self.select_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // In case of tie, the first one is selected (stability)
        let chosen = healthy
            .iter()
            .min_by_key(|b| b.connections())
            .ok_or(SelectError::NoHealthyBackend)?;

        let guard = chosen.acquire();
        Ok(Selection {
            backend: chosen.clone(),
            guard: Some(guard),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::backends;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let pool = backends(&[("http://a:1", 1), ("http://b:1", 1)]);

        // b has 3 in flight
        let _held: Vec<_> = (0..3).map(|_| pool[1].acquire()).collect();

        let s1 = lb.next_server(&pool).unwrap();
        assert_eq!(s1.backend.url, "http://a:1");
        assert_eq!(pool[0].connections(), 1);

        // a=1, b=3: a again, now a=2
        let s2 = lb.next_server(&pool).unwrap();
        assert_eq!(s2.backend.url, "http://a:1");
        assert_eq!(pool[0].connections(), 2);

        drop(s1);
        drop(s2);
        assert_eq!(pool[0].connections(), 0);
    }

    #[test]
    fn test_tie_breaks_by_config_order() {
        let lb = LeastConnections::new();
        let pool = backends(&[("http://a:1", 1), ("http://b:1", 1), ("http://c:1", 1)]);

        let picks: Vec<_> = (0..3).map(|_| lb.next_server(&pool).unwrap()).collect();
        let urls: Vec<&str> = picks.iter().map(|s| s.backend.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a:1", "http://b:1", "http://c:1"]);
    }

    #[test]
    fn test_concurrent_selections_restore_counters() {
        let lb = Arc::new(LeastConnections::new());
        let pool = Arc::new(backends(&[("http://a:1", 1), ("http://b:1", 1)]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let selection = lb.next_server(&pool).unwrap();
                        drop(selection);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(pool[0].connections(), 0);
        assert_eq!(pool[1].connections(), 0);
    }

    #[test]
    fn test_concurrent_holders_spread_evenly() {
        let lb = Arc::new(LeastConnections::new());
        let pool = Arc::new(backends(&[("http://a:1", 1), ("http://b:1", 1)]));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let lb = lb.clone();
                let pool = pool.clone();
                std::thread::spawn(move || lb.next_server(&pool).unwrap())
            })
            .collect();
        let held: Vec<Selection> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // No two selections saw the same pre-increment count.
        assert_eq!(pool[0].connections(), 5);
        assert_eq!(pool[1].connections(), 5);

        drop(held);
        assert_eq!(pool[0].connections(), 0);
        assert_eq!(pool[1].connections(), 0);
    }

    #[test]
    fn test_empty() {
        let lb = LeastConnections::new();
        assert_eq!(lb.next_server(&[]).unwrap_err(), SelectError::NoHealthyBackend);
    }
}
