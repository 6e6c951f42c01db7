//! Package update

use std::sync::Arc;

use async_trait::async_trait;
use fleetops_exec::RemoteExecutor;
use fleetops_inventory::NodeRecord;
use fleetops_pkg::{PackageManager, UpdateKind};
use tracing::debug;

use super::Operation;
use crate::config::{ManagerChoice, PrivilegeSettings};
use crate::outcome::Outcome;

/// Refresh package metadata, then apply security or full upgrades
pub struct Update {
    executor: Arc<dyn RemoteExecutor>,
    kind: UpdateKind,
    settings: PrivilegeSettings,
}

impl Update {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        kind: UpdateKind,
        settings: PrivilegeSettings,
    ) -> Self {
        Self {
            executor,
            kind,
            settings,
        }
    }

    async fn manager_for(
        &self,
        node: &NodeRecord,
    ) -> Result<Arc<dyn PackageManager>, fleetops_pkg::PackageError> {
        match self.settings.manager {
            ManagerChoice::Fixed(kind) => Ok(fleetops_pkg::for_type(kind, self.settings.use_sudo)),
            ManagerChoice::Auto => {
                fleetops_pkg::detect(&*self.executor, &node.address, self.settings.use_sudo).await
            }
        }
    }
}

#[async_trait]
impl Operation for Update {
    fn name(&self) -> &str {
        "update"
    }

    async fn execute(&self, node: &NodeRecord) -> Outcome {
        let manager = match self.manager_for(node).await {
            Ok(manager) => manager,
            Err(e) => return Outcome::from_package_error(&node.hostname, &e),
        };

        debug!(host = %node.hostname, manager = %manager.manager_type(), kind = %self.kind, "updating");

        match manager
            .update(&*self.executor, &node.address, self.kind)
            .await
        {
            Ok(summary) => Outcome::success(
                &node.hostname,
                format!(
                    "{} update via {}: {summary}",
                    self.kind,
                    manager.manager_type()
                ),
            ),
            Err(e) => Outcome::from_package_error(&node.hostname, &e),
        }
    }
}
