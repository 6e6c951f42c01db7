//! Package manager traits

use async_trait::async_trait;
use fleetops_exec::RemoteExecutor;
use tracing::{debug, info, instrument, warn};

use crate::error::PackageError;
use crate::types::{PackageManagerType, UpdateKind, UpgradeSummary};

/// Command set for one package manager
///
/// Implementors only describe commands and parse output; [`update`] drives
/// them through a [`RemoteExecutor`].
///
/// [`update`]: PackageManager::update
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Which manager this is
    fn manager_type(&self) -> PackageManagerType;

    /// Command refreshing repository metadata
    fn refresh_cmd(&self) -> String;

    /// Command applying upgrades of the given kind
    fn upgrade_cmd(&self, kind: UpdateKind) -> String;

    /// Command exiting 0 when a reboot is required
    fn reboot_check_cmd(&self) -> String;

    /// Parse upgrade output into a summary
    fn parse_upgrade_output(&self, stdout: &str, stderr: &str) -> UpgradeSummary;

    /// Refresh-then-upgrade sequence as a single shell command
    fn update_sequence(&self, kind: UpdateKind) -> String {
        format!("{} && {}", self.refresh_cmd(), self.upgrade_cmd(kind))
    }

    /// Run the refresh-then-upgrade sequence on `address`
    ///
    /// The reboot check afterwards is best effort: if it cannot run, the
    /// summary reports no reboot.
    ///
    /// # Errors
    /// Returns `PackageError::Execution` on transport failure, or a classified
    /// error when the sequence exits non-zero.
    #[instrument(skip(self, executor), fields(manager = %self.manager_type()))]
    async fn update(
        &self,
        executor: &dyn RemoteExecutor,
        address: &str,
        kind: UpdateKind,
    ) -> Result<UpgradeSummary, PackageError> {
        let cmd = self.update_sequence(kind);
        debug!(command = %cmd, "running update sequence");

        let result = executor.run_command(address, &cmd).await?;
        if !result.success() {
            return Err(PackageError::from_failure(result.status, &result.stderr));
        }

        let mut summary = self.parse_upgrade_output(&result.stdout, &result.stderr);
        summary.manager = Some(self.manager_type());

        match executor
            .run_command(address, &self.reboot_check_cmd())
            .await
        {
            Ok(check) => summary.reboot_required = check.success(),
            Err(e) => warn!(error = %e, "reboot check failed"),
        }

        info!(
            upgraded = summary.upgraded_count,
            reboot_required = summary.reboot_required,
            "update completed"
        );

        Ok(summary)
    }
}
