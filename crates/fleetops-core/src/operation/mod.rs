//! Operations applied to every node of a dispatch
//!
//! An [`Operation`] maps one [`NodeRecord`] to exactly one [`Outcome`]. The
//! signature is infallible on purpose: every transport error must be turned
//! into a failed outcome inside `execute`, so a failing node can never abort
//! the rest of the batch.

mod deploy;
mod health;
mod service;
mod update;

use std::sync::Arc;

use async_trait::async_trait;
use fleetops_inventory::NodeRecord;

use crate::outcome::Outcome;

pub use deploy::Deploy;
pub use health::{HealthCheck, HealthMetrics};
pub use service::{ServiceAction, ServiceControl};
pub use update::Update;

/// Work applied identically to every node
#[async_trait]
pub trait Operation: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Run against one node and report its outcome
    async fn execute(&self, node: &NodeRecord) -> Outcome;
}

/// Operation backed by an async closure
pub struct FnOperation<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F>
where
    F: Fn(NodeRecord) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, node: &NodeRecord) -> Outcome {
        (self.f)(node.clone()).await
    }
}

/// Wrap an async closure as an [`Operation`]
///
/// ```ignore
/// let op = operation_fn("ping", |node| async move {
///     Outcome::success(node.hostname, "pong")
/// });
/// ```
pub fn operation_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Operation>
where
    F: Fn(NodeRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(FnOperation {
        name: name.into(),
        f,
    })
}
