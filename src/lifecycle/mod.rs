//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Registry → Watcher + reloader
//!         → Metrics → Health monitor → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Server stops accepting, drains
//!         → Health monitor and reloader exit their loops → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - One broadcast signal stops every background loop

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::StartupError;
