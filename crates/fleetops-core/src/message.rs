//! Message types for actor communication
//!
//! Message handlers are implemented in [`crate::actor::fleet`].

use std::path::PathBuf;

use fleetops_pkg::UpdateKind;
use kameo_macros::Reply;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::event::FleetEvent;
use crate::operation::ServiceAction;

/// List the nodes the actor dispatches to
#[derive(Debug)]
pub struct ListNodes;

/// Run one built-in operation across the whole inventory
#[derive(Debug, Clone)]
pub struct RunOperation {
    pub request: OperationRequest,
}

/// Built-in operation with its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationRequest {
    HealthCheck,
    Deploy {
        local_file: PathBuf,
        remote_path: String,
    },
    Update {
        #[serde(default)]
        kind: UpdateKind,
    },
    Service {
        service: String,
        action: ServiceAction,
    },
}

/// Subscribe to dispatch progress events
#[derive(Debug)]
pub struct Subscribe;

/// Receiver half of the actor's event channel
#[derive(Debug, Reply)]
pub struct EventSubscription(pub broadcast::Receiver<FleetEvent>);

impl EventSubscription {
    #[must_use]
    pub fn into_inner(self) -> broadcast::Receiver<FleetEvent> {
        self.0
    }
}
