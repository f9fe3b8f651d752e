//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs (one timed GET per backend, concurrently)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//! ```
//!
//! # Design Decisions
//! - Probe errors are recorded as unhealthy, never fatal, never retried within a cycle
//! - Health state is per-backend identity and survives reloads that keep the URL
//! - The monitor loop exits on the shutdown broadcast

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use state::HealthState;
