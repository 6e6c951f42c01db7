//! DNF package manager (Fedora/RHEL/CentOS)

use crate::traits::PackageManager;
use crate::types::{PackageManagerType, UpdateKind, UpgradeSummary};

/// DNF package manager implementation
///
/// Also drives `yum`, whose command set is compatible for our purposes.
#[derive(Debug, Clone)]
pub struct DnfManager {
    use_sudo: bool,
    /// Whether to use yum instead of dnf
    use_yum: bool,
}

impl DnfManager {
    /// Create a new DNF manager
    #[must_use]
    pub fn new(use_sudo: bool) -> Self {
        Self {
            use_sudo,
            use_yum: false,
        }
    }

    /// Create a manager driving yum
    #[must_use]
    pub fn yum(use_sudo: bool) -> Self {
        Self {
            use_sudo,
            use_yum: true,
        }
    }

    /// Build dnf/yum command with optional sudo
    fn pkg_cmd(&self, args: &str) -> String {
        let tool = if self.use_yum { "yum" } else { "dnf" };
        if self.use_sudo {
            format!("sudo {tool} {args}")
        } else {
            format!("{tool} {args}")
        }
    }

    /// Count from a transaction summary line such as `Upgrade  5 Packages`
    fn summary_count(line: &str, verb: &str) -> Option<u32> {
        let rest = line.trim().strip_prefix(verb)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest.split_whitespace().next()?.parse().ok()
    }
}

impl PackageManager for DnfManager {
    fn manager_type(&self) -> PackageManagerType {
        if self.use_yum {
            PackageManagerType::Yum
        } else {
            PackageManagerType::Dnf
        }
    }

    fn refresh_cmd(&self) -> String {
        self.pkg_cmd("-q makecache")
    }

    fn upgrade_cmd(&self, kind: UpdateKind) -> String {
        match kind {
            UpdateKind::Security => self.pkg_cmd("-y upgrade --security"),
            UpdateKind::Full => self.pkg_cmd("-y upgrade"),
        }
    }

    fn reboot_check_cmd(&self) -> String {
        // needs-restarting -r exits 1 when a reboot is needed
        "command -v needs-restarting >/dev/null 2>&1 && ! needs-restarting -r >/dev/null 2>&1"
            .to_string()
    }

    fn parse_upgrade_output(&self, stdout: &str, _stderr: &str) -> UpgradeSummary {
        let mut summary = UpgradeSummary::default();

        for line in stdout.lines() {
            if let Some(n) = Self::summary_count(line, "Upgrade") {
                summary.upgraded_count = n;
            } else if let Some(n) = Self::summary_count(line, "Install") {
                summary.new_count = n;
            } else if let Some(n) = Self::summary_count(line, "Remove") {
                summary.removed_count = n;
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSACTION: &str = "\
Dependencies resolved.
Transaction Summary
================================================================================
Install   1 Package
Upgrade   5 Packages

Total download size: 12 M
Complete!
";

    #[test]
    fn test_parse_transaction_summary() {
        let summary = DnfManager::new(false).parse_upgrade_output(TRANSACTION, "");

        assert_eq!(summary.upgraded_count, 5);
        assert_eq!(summary.new_count, 1);
        assert_eq!(summary.removed_count, 0);
    }

    #[test]
    fn test_parse_nothing_to_do() {
        let summary = DnfManager::new(false)
            .parse_upgrade_output("Dependencies resolved.\nNothing to do.\nComplete!\n", "");
        assert_eq!(summary.upgraded_count, 0);
    }

    #[test]
    fn test_upgraded_header_is_not_a_count() {
        // the "Upgraded:" package list header must not be read as a count
        let summary =
            DnfManager::new(false).parse_upgrade_output("Upgraded:\n  vim-9.0.x86_64\n", "");
        assert_eq!(summary.upgraded_count, 0);
    }

    #[test]
    fn test_commands() {
        let dnf = DnfManager::new(true);
        assert_eq!(dnf.refresh_cmd(), "sudo dnf -q makecache");
        assert_eq!(
            dnf.upgrade_cmd(UpdateKind::Security),
            "sudo dnf -y upgrade --security"
        );

        let yum = DnfManager::yum(false);
        assert_eq!(yum.manager_type(), PackageManagerType::Yum);
        assert_eq!(yum.upgrade_cmd(UpdateKind::Full), "yum -y upgrade");
    }
}
