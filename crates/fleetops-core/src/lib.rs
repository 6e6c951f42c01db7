//! fleetops-core: Fleet operation dispatch
//!
//! Runs one [`Operation`] against every node of an [`Inventory`] with bounded
//! concurrency, isolates per-node failures and reduces the outcomes into an
//! [`AggregateReport`]. [`FleetActor`] wraps the dispatcher in a kameo actor.
//!
//! [`Inventory`]: fleetops_inventory::Inventory

pub mod actor;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod operation;
pub mod outcome;
pub mod report;

#[cfg(test)]
mod testing;

pub use actor::{FleetActor, FleetActorArgs};
pub use config::{ConcurrencyLimit, ManagerChoice, PrivilegeSettings};
pub use dispatch::Dispatcher;
pub use error::CoreError;
pub use event::FleetEvent;
pub use message::{EventSubscription, ListNodes, OperationRequest, RunOperation, Subscribe};
pub use operation::{
    Deploy, FnOperation, HealthCheck, HealthMetrics, Operation, ServiceAction, ServiceControl,
    Update, operation_fn,
};
pub use outcome::{ErrorKind, Outcome};
pub use report::{AggregateReport, ReportSink, SinkError, ZERO_NODE_SUCCESS_RATE, aggregate};
