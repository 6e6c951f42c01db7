//! Remote executor trait

use std::path::Path;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Capability for running commands and copying files on a node
///
/// Implementations bound every call with their own timeout, so a single
/// unreachable node can never block a caller indefinitely.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell command on the node at `address`
    ///
    /// A non-zero exit status is reported through `CommandResult::status`,
    /// not as an error. Use [`CommandResult::into_checked`] to treat it as one.
    async fn run_command(&self, address: &str, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Copy a local file to `remote_path` on the node at `address`
    async fn copy_file(
        &self,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), ExecError>;

    /// Short name of the transport, used in logs
    fn executor_type(&self) -> &'static str;
}
