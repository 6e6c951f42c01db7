//! Package manager detection

use std::sync::Arc;

use fleetops_exec::RemoteExecutor;
use tracing::{debug, instrument};

use crate::apt::AptManager;
use crate::dnf::DnfManager;
use crate::error::PackageError;
use crate::traits::PackageManager;
use crate::types::PackageManagerType;

/// Probe printing the first supported manager found on the node
///
/// apt is tried first, then dnf, then yum.
pub const DETECT_CMD: &str = "for m in apt-get dnf yum; do \
    if command -v \"$m\" >/dev/null 2>&1; then echo \"$m\"; exit 0; fi; \
    done; exit 1";

/// Build a manager from the output of [`DETECT_CMD`]
///
/// # Errors
/// Returns `PackageError::ManagerNotFound` if the output names no supported
/// manager.
pub fn from_probe_output(
    output: &str,
    use_sudo: bool,
) -> Result<Arc<dyn PackageManager>, PackageError> {
    let kind: PackageManagerType = output
        .lines()
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| {
            PackageError::ManagerNotFound("no supported package manager (tried apt, dnf, yum)".into())
        })?;

    Ok(for_type(kind, use_sudo))
}

/// Build a manager for a known type
#[must_use]
pub fn for_type(kind: PackageManagerType, use_sudo: bool) -> Arc<dyn PackageManager> {
    match kind {
        PackageManagerType::Apt => Arc::new(AptManager::new(use_sudo)),
        PackageManagerType::Dnf => Arc::new(DnfManager::new(use_sudo)),
        PackageManagerType::Yum => Arc::new(DnfManager::yum(use_sudo)),
    }
}

/// Detect the package manager on the node at `address`
///
/// # Errors
/// Returns `PackageError::Execution` on transport failure or
/// `PackageError::ManagerNotFound` if the probe finds nothing.
#[instrument(skip(executor))]
pub async fn detect(
    executor: &dyn RemoteExecutor,
    address: &str,
    use_sudo: bool,
) -> Result<Arc<dyn PackageManager>, PackageError> {
    let result = executor.run_command(address, DETECT_CMD).await?;
    if !result.success() {
        return Err(PackageError::ManagerNotFound(
            "no supported package manager (tried apt, dnf, yum)".into(),
        ));
    }

    let manager = from_probe_output(&result.stdout, use_sudo)?;
    debug!(manager = %manager.manager_type(), use_sudo, "detected package manager");
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    use fleetops_exec::LocalExecutor;

    #[test]
    fn test_from_probe_output() {
        let apt = from_probe_output("apt-get\n", true).unwrap();
        assert_eq!(apt.manager_type(), PackageManagerType::Apt);

        let yum = from_probe_output("yum", false).unwrap();
        assert_eq!(yum.manager_type(), PackageManagerType::Yum);

        assert!(matches!(
            from_probe_output("", false),
            Err(PackageError::ManagerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_detect_cmd_is_valid_shell() {
        // exit status depends on the host; the probe must still run cleanly
        let result = LocalExecutor::new()
            .run_command("localhost", DETECT_CMD)
            .await
            .unwrap();
        assert!(result.status == 0 || result.status == 1);
        assert!(result.stderr.is_empty());
    }
}
