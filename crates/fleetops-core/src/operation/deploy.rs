//! File deployment

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fleetops_exec::RemoteExecutor;
use fleetops_inventory::NodeRecord;

use super::Operation;
use crate::outcome::Outcome;

/// Copy one local file to the same remote path on every node
pub struct Deploy {
    executor: Arc<dyn RemoteExecutor>,
    local_file: PathBuf,
    remote_path: String,
}

impl Deploy {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        local_file: impl Into<PathBuf>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            local_file: local_file.into(),
            remote_path: remote_path.into(),
        }
    }
}

#[async_trait]
impl Operation for Deploy {
    fn name(&self) -> &str {
        "deploy"
    }

    async fn execute(&self, node: &NodeRecord) -> Outcome {
        match self
            .executor
            .copy_file(&node.address, &self.local_file, &self.remote_path)
            .await
        {
            Ok(()) => Outcome::success(
                &node.hostname,
                format!("deployed {} to {}", self.local_file.display(), self.remote_path),
            ),
            Err(e) => Outcome::from_exec_error(&node.hostname, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;
    use crate::testing::ScriptedExecutor;
    use fleetops_exec::ExecError;

    #[tokio::test]
    async fn test_deploy_success() {
        let executor = Arc::new(ScriptedExecutor::new());
        let op = Deploy::new(executor.clone(), "/tmp/app.conf", "/etc/app/app.conf");
        let node = NodeRecord::new("web1", "10.0.0.1", "webserver", "production");

        let outcome = op.execute(&node).await;

        assert!(outcome.success);
        assert_eq!(outcome.detail, "deployed /tmp/app.conf to /etc/app/app.conf");
        assert_eq!(
            executor.recorded(),
            vec!["10.0.0.1: copy /tmp/app.conf /etc/app/app.conf"]
        );
    }

    #[tokio::test]
    async fn test_deploy_copy_failure() {
        let executor = ScriptedExecutor::new()
            .failing_copy(ExecError::TransferFailed("permission denied".into()));
        let op = Deploy::new(Arc::new(executor), "/tmp/app.conf", "/etc/app/app.conf");
        let node = NodeRecord::new("web1", "10.0.0.1", "webserver", "production");

        let outcome = op.execute(&node).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::Transfer));
        assert!(outcome.detail.contains("permission denied"));
    }
}
