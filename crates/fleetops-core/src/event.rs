//! Dispatch progress events

use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

/// Events published while a dispatch runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    /// Dispatch accepted and tasks scheduled
    DispatchStarted {
        operation: String,
        total: usize,
        limit: usize,
    },
    /// A node acquired a concurrency slot
    NodeStarted { hostname: String },
    /// A node produced its outcome
    NodeFinished { outcome: Outcome },
    /// Cancellation abandoned the remaining nodes
    DispatchCancelled { operation: String, abandoned: usize },
    /// Every node has been accounted for
    DispatchFinished {
        operation: String,
        total: usize,
        succeeded: usize,
        failed: usize,
        success_rate_percent: u8,
    },
}
