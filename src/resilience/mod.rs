//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request enters dispatcher:
//!     → chaos.rs (maybe fail synthetically, before any selection)
//!     → per attempt: timeouts.rs (fresh deadline for the whole attempt)
//!     → On failure: retries.rs (record, pick a different backend next)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Transport errors and 5xx responses are attempt failures; anything else is final
//! - A request never contacts the same backend twice

pub mod chaos;
pub mod retries;
pub mod timeouts;
