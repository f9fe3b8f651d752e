//! Retry bookkeeping.
//!
//! # Responsibilities
//! - Classify attempt outcomes (transport errors and 5xx are failures)
//! - Track which backends a request already tried
//! - Own the connection guards taken during the request
//!
//! # Design Decisions
//! - No backoff between attempts; the next attempt goes to a different backend
//! - Guards live as long as the request's `RequestAttempts`, or as long as the
//!   forwarded response body once handed over with `into_guards`; every
//!   least-connections increment is paired with one decrement on any exit path

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::load_balancer::backend::{Backend, ConnectionGuard};
use crate::load_balancer::{SelectError, Selection};

/// Why one attempt did not produce a response for the client.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error("failed to build upstream request: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend responded with {0}")]
    Status(StatusCode),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl AttemptError {
    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            AttemptError::Select(_) => "no_backend",
            AttemptError::Build(_) => "build_error",
            AttemptError::Transport(_) => "transport_error",
            AttemptError::Status(_) => "server_error",
            AttemptError::Timeout(_) => "timeout",
        }
    }
}

/// Whether a backend status counts as a failed attempt.
pub fn is_failure_status(status: StatusCode) -> bool {
    status.as_u16() >= 500
}

/// Per-request attempt state.
#[derive(Debug)]
pub struct RequestAttempts {
    max_attempts: u32,
    tried: HashSet<String>,
    guards: Vec<ConnectionGuard>,
    last_error: Option<AttemptError>,
}

impl RequestAttempts {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            tried: HashSet::new(),
            guards: Vec::new(),
            last_error: None,
        }
    }

    /// Attempt numbers, 1-based.
    pub fn numbers(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts
    }

    /// Accept a selection if its backend has not been tried by this request.
    ///
    /// A repeat selection is a wasted attempt: its guard (if any) is released
    /// immediately since the backend is not contacted again.
    pub fn claim(&mut self, selection: Selection) -> Option<Arc<Backend>> {
        let Selection { backend, guard } = selection;
        if !self.tried.insert(backend.url.clone()) {
            return None;
        }
        self.guards.extend(guard);
        Some(backend)
    }

    pub fn record_failure(&mut self, error: AttemptError) {
        self.last_error = Some(error);
    }

    pub fn last_error(&self) -> Option<&AttemptError> {
        self.last_error.as_ref()
    }

    /// Number of distinct backends contacted so far.
    pub fn tried(&self) -> usize {
        self.tried.len()
    }

    /// Release ownership of the connection guards taken so far.
    pub fn into_guards(self) -> Vec<ConnectionGuard> {
        self.guards
    }
}
