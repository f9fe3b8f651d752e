//! Chaos fault injection.
//!
//! With a configured error rate `r`, each request is failed synthetically with
//! probability `r` before any backend is selected.

use rand::Rng;

/// Roll once for a request. A rate of 0 never fires; a rate of 1 always does.
pub fn should_inject(error_rate: f64) -> bool {
    error_rate > 0.0 && rand::thread_rng().gen::<f64>() < error_rate
}
