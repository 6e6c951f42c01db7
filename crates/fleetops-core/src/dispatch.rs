//! Bounded-concurrency dispatch of one operation across an inventory

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use fleetops_inventory::{Inventory, NodeRecord};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ConcurrencyLimit;
use crate::error::CoreError;
use crate::event::FleetEvent;
use crate::operation::Operation;
use crate::outcome::{ErrorKind, Outcome};
use crate::report::{AggregateReport, aggregate};

/// Runs an operation on every node with at most `limit` invocations in flight
#[derive(Debug, Clone)]
pub struct Dispatcher {
    limit: ConcurrencyLimit,
    cancel: CancellationToken,
    events: Option<broadcast::Sender<FleetEvent>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(ConcurrencyLimit::default())
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(limit: ConcurrencyLimit) -> Self {
        Self {
            limit,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Abandon waiting and running invocations once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publish progress on `sender`
    #[must_use]
    pub fn with_events(mut self, sender: broadcast::Sender<FleetEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    #[must_use]
    pub fn limit(&self) -> ConcurrencyLimit {
        self.limit
    }

    fn emit(&self, event: FleetEvent) {
        if let Some(tx) = &self.events {
            // no subscribers is fine
            let _ = tx.send(event);
        }
    }

    /// Run `operation` once per node and aggregate the outcomes
    ///
    /// Returns after every node has produced an outcome, or after
    /// cancellation has abandoned the rest. Per-node failures, panics
    /// included, are reported as failed outcomes and never abort the batch.
    ///
    /// # Errors
    /// Returns `CoreError::Cancelled` if the dispatch was cancelled before
    /// any node of a non-empty inventory completed.
    #[instrument(skip_all, fields(operation = %operation.name(), nodes = inventory.len(), limit = %self.limit))]
    pub async fn dispatch(
        &self,
        inventory: &Inventory,
        operation: Arc<dyn Operation>,
    ) -> Result<AggregateReport, CoreError> {
        let name = operation.name().to_string();
        let total = inventory.len();

        info!("dispatch started");
        self.emit(FleetEvent::DispatchStarted {
            operation: name.clone(),
            total,
            limit: self.limit.get(),
        });

        // more permits than nodes never bind; tokio also caps the permit count
        let permits = self
            .limit
            .get()
            .min(total.max(1))
            .min(Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for node in inventory.iter().cloned() {
            let slot = NodeSlot {
                semaphore: semaphore.clone(),
                cancel: self.cancel.clone(),
                events: self.events.clone(),
            };
            tasks.spawn(slot.run(node, operation.clone()));
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => error!(error = %e, "dispatch task failed"),
            }
        }

        let abandoned = abandoned_hosts(inventory, &outcomes);
        if !abandoned.is_empty() {
            warn!(
                completed = outcomes.len(),
                abandoned = abandoned.len(),
                "dispatch cancelled"
            );
            self.emit(FleetEvent::DispatchCancelled {
                operation: name.clone(),
                abandoned: abandoned.len(),
            });
            if outcomes.is_empty() {
                return Err(CoreError::Cancelled);
            }
        }

        let report = aggregate(name, outcomes).with_abandoned(abandoned);

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            success_rate = report.success_rate_percent,
            "dispatch finished"
        );
        self.emit(FleetEvent::DispatchFinished {
            operation: report.operation.clone(),
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
            success_rate_percent: report.success_rate_percent,
        });

        Ok(report)
    }
}

/// Shared handles one per-node task needs
struct NodeSlot {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    events: Option<broadcast::Sender<FleetEvent>>,
}

impl NodeSlot {
    fn emit(&self, event: FleetEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// `None` when the node was abandoned
    async fn run(self, node: NodeRecord, operation: Arc<dyn Operation>) -> Option<Outcome> {
        let _permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok()?,
        };

        let hostname = node.hostname.clone();
        debug!(host = %hostname, "node started");
        self.emit(FleetEvent::NodeStarted {
            hostname: hostname.clone(),
        });

        let started = Instant::now();
        // inner task so a panic stays confined to this node
        let mut invocation = tokio::spawn(async move { operation.execute(&node).await });

        // a finished invocation wins over a cancellation seen at the same time
        let joined = tokio::select! {
            biased;
            joined = &mut invocation => joined,
            () = self.cancel.cancelled() => {
                invocation.abort();
                debug!(host = %hostname, "node abandoned while running");
                return None;
            }
        };

        let outcome = match joined {
            Ok(mut outcome) => {
                if outcome.hostname != hostname {
                    warn!(host = %hostname, reported = %outcome.hostname, "outcome hostname corrected");
                    outcome.hostname.clone_from(&hostname);
                }
                outcome
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!(host = %hostname, panic = %message, "operation panicked");
                Outcome::failed(&hostname, ErrorKind::Panicked, format!("operation panicked: {message}"))
            }
            Err(e) => Outcome::failed(&hostname, ErrorKind::Other, e.to_string()),
        }
        .with_elapsed(started.elapsed());

        if outcome.success {
            debug!(host = %hostname, elapsed = ?outcome.elapsed, "node succeeded");
        } else {
            warn!(host = %hostname, error = ?outcome.error, detail = %outcome.detail, "node failed");
        }
        self.emit(FleetEvent::NodeFinished {
            outcome: outcome.clone(),
        });

        Some(outcome)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn abandoned_hosts(inventory: &Inventory, outcomes: &[Outcome]) -> Vec<String> {
    let done: HashSet<&str> = outcomes.iter().map(|o| o.hostname.as_str()).collect();
    inventory
        .hostnames()
        .into_iter()
        .filter(|h| !done.contains(h))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::operation_fn;
    use std::time::Duration;

    fn inventory(n: usize) -> Inventory {
        (0..n)
            .map(|i| NodeRecord::new(format!("node{i:02}"), format!("10.0.0.{i}"), "web", "prod"))
            .collect()
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_outcome() {
        let op = operation_fn("explode", |node: NodeRecord| async move {
            if node.hostname == "node01" {
                panic!("boom");
            }
            Outcome::success(node.hostname, "ok")
        });

        let report = Dispatcher::new(ConcurrencyLimit::new(2).unwrap())
            .dispatch(&inventory(3), op)
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.failed, 1);
        let failed = report.failures().next().unwrap();
        assert_eq!(failed.hostname, "node01");
        assert_eq!(failed.error, Some(ErrorKind::Panicked));
        assert!(failed.detail.contains("boom"));
    }

    #[tokio::test]
    async fn test_outcome_hostname_forced_to_node() {
        let op = operation_fn("liar", |_node: NodeRecord| async move {
            Outcome::success("somebody-else", "ok")
        });

        let report = Dispatcher::default()
            .dispatch(&inventory(2), op)
            .await
            .unwrap();

        let hosts: Vec<_> = report.per_node.iter().map(|o| o.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["node00", "node01"]);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let op = operation_fn("noop", |node: NodeRecord| async move {
            Outcome::success(node.hostname, "ok")
        });

        let result = Dispatcher::default()
            .with_cancellation(token)
            .dispatch(&inventory(3), op)
            .await;

        assert_eq!(result, Err(CoreError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_keeps_completed_outcomes() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let op = operation_fn("slow", move |node: NodeRecord| {
            let trigger = trigger.clone();
            async move {
                if node.hostname == "node00" {
                    trigger.cancel();
                    return Outcome::success(node.hostname, "fast");
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
                Outcome::success(node.hostname, "slow")
            }
        });

        // limit 1: node00 runs alone, then cancellation abandons the rest
        let report = Dispatcher::new(ConcurrencyLimit::new(1).unwrap())
            .with_cancellation(token)
            .dispatch(&inventory(3), op)
            .await
            .unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.per_node[0].hostname, "node00");
        assert_eq!(report.abandoned, vec!["node01", "node02"]);
        assert!(report.was_cancelled());
    }

    #[tokio::test]
    async fn test_huge_limit_is_capped_by_node_count() {
        let op = operation_fn("noop", |node: NodeRecord| async move {
            Outcome::success(node.hostname, "ok")
        });

        let report = Dispatcher::new(ConcurrencyLimit::new(usize::MAX).unwrap())
            .dispatch(&inventory(3), op)
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_empty_inventory() {
        let op = operation_fn("noop", |node: NodeRecord| async move {
            Outcome::success(node.hostname, "ok")
        });

        let report = Dispatcher::default()
            .dispatch(&Inventory::default(), op)
            .await
            .unwrap();

        assert_eq!(report.total, 0);
        assert_eq!(report.success_rate_percent, 100);
    }

    #[tokio::test]
    async fn test_events_published() {
        let (tx, mut rx) = broadcast::channel(64);
        let op = operation_fn("noop", |node: NodeRecord| async move {
            Outcome::success(node.hostname, "ok")
        });

        Dispatcher::default()
            .with_events(tx)
            .dispatch(&inventory(2), op)
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events.len(), 6);
        assert!(matches!(events.first(), Some(FleetEvent::DispatchStarted { total: 2, .. })));
        assert!(matches!(
            events.last(),
            Some(FleetEvent::DispatchFinished { succeeded: 2, .. })
        ));
    }
}
