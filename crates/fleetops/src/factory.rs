//! Executor routing: local shell for loopback addresses, SSH for the rest

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use fleetops_exec::{
    CommandResult, ExecError, LocalExecutor, RemoteExecutor, SshExecutor, SshExecutorBuilder,
};
use fleetops_inventory::Inventory;

use crate::config::Config;

/// Whether `address` names this machine
pub fn is_local(address: &str) -> bool {
    matches!(address, "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

/// Routes each call to a local or SSH executor by address
pub struct FleetExecutor {
    local: LocalExecutor,
    remote: Option<Arc<dyn RemoteExecutor>>,
    /// Session pool closed by [`FleetExecutor::shutdown`]
    ssh: Option<Arc<SshExecutor>>,
}

impl FleetExecutor {
    /// Build executors for the nodes in `inventory`
    ///
    /// The SSH key is only resolved when some node is remote.
    ///
    /// # Errors
    /// Returns error if a remote node exists and the SSH key cannot be loaded
    pub fn for_inventory(config: &Config, inventory: &Inventory) -> Result<Self> {
        let timeout = config.dispatch.timeout();
        let needs_ssh = inventory.iter().any(|n| !is_local(&n.address));

        let ssh = if needs_ssh {
            let mut builder = SshExecutorBuilder::new(&config.ssh.user)
                .with_port(config.ssh.port)
                .with_timeout(timeout);
            if let Some(var) = &config.ssh.key_env {
                builder = builder.with_env_key(var);
            } else if let Some(path) = &config.ssh.key_path {
                builder = builder.with_key_path(path);
            }
            let executor = builder
                .build()
                .wrap_err("failed to create SSH executor")?;
            Some(Arc::new(executor))
        } else {
            None
        };

        Ok(Self {
            local: LocalExecutor::new().with_timeout(timeout),
            remote: ssh.clone().map(|s| s as Arc<dyn RemoteExecutor>),
            ssh,
        })
    }

    /// Close pooled SSH sessions
    pub async fn shutdown(&self) {
        if let Some(ssh) = &self.ssh {
            ssh.disconnect_all().await;
        }
    }

    #[cfg(test)]
    fn with_remote(remote: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            local: LocalExecutor::new(),
            remote: Some(remote),
            ssh: None,
        }
    }

    fn route(&self, address: &str) -> Result<&dyn RemoteExecutor, ExecError> {
        if is_local(address) {
            return Ok(&self.local);
        }
        self.remote
            .as_deref()
            .ok_or_else(|| ExecError::ConfigError(format!("no SSH executor for {address}")))
    }
}

#[async_trait]
impl RemoteExecutor for FleetExecutor {
    async fn run_command(&self, address: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        self.route(address)?.run_command(address, cmd).await
    }

    async fn copy_file(
        &self,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), ExecError> {
        self.route(address)?
            .copy_file(address, local_path, remote_path)
            .await
    }

    fn executor_type(&self) -> &'static str {
        if self.remote.is_some() { "ssh" } else { "local" }
    }
}
