//! Local command execution using `tokio::process`

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::{CommandResult, DEFAULT_TIMEOUT};
use crate::traits::RemoteExecutor;

/// Local command executor
///
/// Executes commands on the local machine using `tokio::process::Command`.
/// The address argument is ignored, which makes this executor suitable for
/// `localhost` entries in an inventory.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    timeout: Duration,
}

impl LocalExecutor {
    /// Create a new local executor with the default timeout
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Internal method to execute command
    async fn execute(cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(command = %cmd, "executing local command");

        // Use shell to support pipes, redirections, etc.
        let child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "command completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    #[instrument(skip(self), level = "debug")]
    async fn run_command(&self, address: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        match timeout(self.timeout, Self::execute(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %cmd,
                    timeout = ?self.timeout,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: self.timeout,
                })
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn copy_file(
        &self,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), ExecError> {
        match timeout(self.timeout, tokio::fs::copy(local_path, remote_path)).await {
            Ok(Ok(bytes)) => {
                debug!(bytes, to = %remote_path, "copied file locally");
                Ok(())
            }
            Ok(Err(e)) => Err(ExecError::TransferFailed(format!(
                "{} -> {remote_path}: {e}",
                local_path.display()
            ))),
            Err(_) => Err(ExecError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
