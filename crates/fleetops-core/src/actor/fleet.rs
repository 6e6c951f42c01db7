//! `FleetActor`: owns the inventory and serialises dispatches
//!
//! The mailbox processes one `RunOperation` at a time, so at most one batch
//! runs against the fleet.

use std::sync::Arc;

use fleetops_exec::RemoteExecutor;
use fleetops_inventory::{Inventory, NodeRecord};
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ConcurrencyLimit, PrivilegeSettings};
use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::event::FleetEvent;
use crate::message::{EventSubscription, ListNodes, OperationRequest, RunOperation, Subscribe};
use crate::operation::{Deploy, HealthCheck, Operation, ServiceControl, Update};
use crate::report::AggregateReport;

/// Arguments for spawning a `FleetActor`
pub struct FleetActorArgs {
    /// Nodes to dispatch to
    pub inventory: Inventory,
    /// Transport shared by every operation
    pub executor: Arc<dyn RemoteExecutor>,
    /// Maximum concurrent invocations
    pub limit: ConcurrencyLimit,
    /// sudo and package manager choice
    pub settings: PrivilegeSettings,
    /// Cancels dispatches for the actor's whole lifetime
    ///
    /// The token is shared by every `RunOperation`; once cancelled, each
    /// later run abandons all nodes and fails with `CoreError::Cancelled`.
    /// Spawn a new actor with a fresh token to dispatch again.
    pub cancel: CancellationToken,
    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,
}

impl FleetActorArgs {
    /// Arguments with default limit, settings and a fresh cancellation token
    pub fn new(inventory: Inventory, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            inventory,
            executor,
            limit: ConcurrencyLimit::default(),
            settings: PrivilegeSettings::default(),
            cancel: CancellationToken::new(),
            event_channel_capacity: 1024,
        }
    }
}

/// Fleet actor running built-in operations through a [`Dispatcher`]
pub struct FleetActor {
    inventory: Inventory,
    executor: Arc<dyn RemoteExecutor>,
    settings: PrivilegeSettings,
    dispatcher: Dispatcher,
    event_tx: broadcast::Sender<FleetEvent>,
}

impl FleetActor {
    /// Get event receiver
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.event_tx.subscribe()
    }

    /// Build the operation a request names
    fn build_operation(&self, request: OperationRequest) -> Result<Arc<dyn Operation>, CoreError> {
        let executor = self.executor.clone();
        let op: Arc<dyn Operation> = match request {
            OperationRequest::HealthCheck => Arc::new(HealthCheck::new(executor)),
            OperationRequest::Deploy {
                local_file,
                remote_path,
            } => {
                if remote_path.trim().is_empty() {
                    return Err(CoreError::InvalidArgument(
                        "remote path must not be empty".to_string(),
                    ));
                }
                Arc::new(Deploy::new(executor, local_file, remote_path))
            }
            OperationRequest::Update { kind } => {
                Arc::new(Update::new(executor, kind, self.settings))
            }
            OperationRequest::Service { service, action } => Arc::new(ServiceControl::new(
                executor,
                service,
                action,
                self.settings.use_sudo,
            )?),
        };
        Ok(op)
    }
}

impl Actor for FleetActor {
    type Args = FleetActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        let (event_tx, _) = broadcast::channel(args.event_channel_capacity.max(1));

        let dispatcher = Dispatcher::new(args.limit)
            .with_cancellation(args.cancel)
            .with_events(event_tx.clone());

        info!(
            id = %actor_ref.id(),
            nodes = args.inventory.len(),
            limit = %args.limit,
            executor = args.executor.executor_type(),
            "FleetActor starting"
        );

        Ok(Self {
            inventory: args.inventory,
            executor: args.executor,
            settings: args.settings,
            dispatcher,
            event_tx,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "FleetActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<ListNodes> for FleetActor {
    type Reply = Vec<NodeRecord>;

    async fn handle(
        &mut self,
        _msg: ListNodes,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.inventory.iter().cloned().collect()
    }
}

impl Message<RunOperation> for FleetActor {
    type Reply = Result<AggregateReport, CoreError>;

    async fn handle(
        &mut self,
        msg: RunOperation,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let operation = self.build_operation(msg.request).inspect_err(|e| {
            warn!(error = %e, "rejected operation request");
        })?;

        self.dispatcher.dispatch(&self.inventory, operation).await
    }
}

impl Message<Subscribe> for FleetActor {
    type Reply = EventSubscription;

    async fn handle(
        &mut self,
        _msg: Subscribe,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        EventSubscription(self.subscribe())
    }
}
