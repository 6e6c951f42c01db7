//! Core error types for fleetops-core

use thiserror::Error;

/// Dispatch-level errors
///
/// Only configuration problems and whole-dispatch cancellation surface here.
/// Per-node failures are never reported through this type; they become failed
/// [`Outcome`](crate::outcome::Outcome)s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Concurrency limit below 1
    #[error("invalid concurrency limit {0}: must be at least 1")]
    InvalidConcurrency(usize),

    /// Operation argument rejected before dispatch
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Dispatch was cancelled before any node finished
    #[error("dispatch cancelled before any node completed")]
    Cancelled,
}
