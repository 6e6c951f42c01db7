//! APT package manager (Debian/Ubuntu)

use crate::traits::PackageManager;
use crate::types::{PackageManagerType, UpdateKind, UpgradeSummary};

/// APT package manager implementation
#[derive(Debug, Clone)]
pub struct AptManager {
    /// Whether to use sudo
    use_sudo: bool,
}

impl AptManager {
    /// Create a new APT manager
    ///
    /// # Arguments
    /// * `use_sudo` - Whether to prefix commands with sudo
    #[must_use]
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    /// Build non-interactive apt-get command with optional sudo
    fn apt_cmd(&self, args: &str) -> String {
        let sudo = if self.use_sudo { "sudo " } else { "" };
        format!("{sudo}env DEBIAN_FRONTEND=noninteractive apt-get {args}")
    }

    /// Parse the "X upgraded, Y newly installed, Z to remove" summary line
    fn parse_summary_line(line: &str, summary: &mut UpgradeSummary) {
        for part in line.split(',') {
            let part = part.trim();
            if let Some(n) = part.find(" upgraded")
                && let Ok(num) = part[..n].trim().parse::<u32>()
            {
                summary.upgraded_count = num;
            }
            if let Some(n) = part.find(" newly installed")
                && let Ok(num) = part[..n].trim().parse::<u32>()
            {
                summary.new_count = num;
            }
            if let Some(n) = part.find(" to remove")
                && let Ok(num) = part[..n].trim().parse::<u32>()
            {
                summary.removed_count = num;
            }
        }
    }
}

impl PackageManager for AptManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Apt
    }

    fn refresh_cmd(&self) -> String {
        self.apt_cmd("update -qq")
    }

    fn upgrade_cmd(&self, kind: UpdateKind) -> String {
        match kind {
            UpdateKind::Full => self.apt_cmd("-y dist-upgrade"),
            UpdateKind::Security => format!(
                "apt list --upgradable 2>/dev/null | grep -- '-security' | cut -d/ -f1 | xargs -r {}",
                self.apt_cmd("-y install --only-upgrade")
            ),
        }
    }

    fn reboot_check_cmd(&self) -> String {
        "test -f /var/run/reboot-required".to_string()
    }

    fn parse_upgrade_output(&self, stdout: &str, stderr: &str) -> UpgradeSummary {
        let mut summary = UpgradeSummary::default();

        // apt-get prints the summary on stdout; older wrappers used stderr
        for line in stdout.lines().chain(stderr.lines()) {
            if line.contains("upgraded,") {
                Self::parse_summary_line(line, &mut summary);
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upgrade_output() {
        let stdout = "Reading package lists...\n5 upgraded, 2 newly installed, 1 to remove and 0 not upgraded.\n";

        let summary = AptManager::new(false).parse_upgrade_output(stdout, "");

        assert_eq!(summary.upgraded_count, 5);
        assert_eq!(summary.new_count, 2);
        assert_eq!(summary.removed_count, 1);
    }

    #[test]
    fn test_parse_upgrade_output_stderr() {
        let stderr = "0 upgraded, 0 newly installed, 0 to remove and 3 not upgraded.";
        let summary = AptManager::new(false).parse_upgrade_output("", stderr);
        assert_eq!(summary, UpgradeSummary::default());
    }

    #[test]
    fn test_commands_with_sudo() {
        let apt = AptManager::new(true);

        assert_eq!(
            apt.refresh_cmd(),
            "sudo env DEBIAN_FRONTEND=noninteractive apt-get update -qq"
        );
        assert_eq!(
            apt.upgrade_cmd(UpdateKind::Full),
            "sudo env DEBIAN_FRONTEND=noninteractive apt-get -y dist-upgrade"
        );
        assert!(
            apt.upgrade_cmd(UpdateKind::Security)
                .ends_with("xargs -r sudo env DEBIAN_FRONTEND=noninteractive apt-get -y install --only-upgrade")
        );
    }

    #[test]
    fn test_update_sequence_refreshes_first() {
        let apt = AptManager::new(false);
        let seq = apt.update_sequence(UpdateKind::Full);
        assert!(seq.starts_with("env DEBIAN_FRONTEND=noninteractive apt-get update -qq && "));
        assert!(seq.ends_with("apt-get -y dist-upgrade"));
    }
}
