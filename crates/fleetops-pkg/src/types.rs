//! Type definitions for package management

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which upgrades an update run applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Only packages coming from security repositories
    #[default]
    Security,
    /// Every available upgrade
    Full,
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::Security => write!(f, "security"),
            UpdateKind::Full => write!(f, "full"),
        }
    }
}

impl FromStr for UpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "security" => Ok(UpdateKind::Security),
            "full" => Ok(UpdateKind::Full),
            other => Err(format!("unknown update kind '{other}' (expected security or full)")),
        }
    }
}

/// Summary parsed from upgrade output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeSummary {
    /// Manager that performed the upgrade
    pub manager: Option<PackageManagerType>,
    /// Number of packages upgraded
    pub upgraded_count: u32,
    /// Number of packages newly installed
    pub new_count: u32,
    /// Number of packages removed
    pub removed_count: u32,
    /// Whether a reboot is required
    pub reboot_required: bool,
}

impl std::fmt::Display for UpgradeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} upgraded", self.upgraded_count)?;
        if self.new_count > 0 {
            write!(f, ", {} newly installed", self.new_count)?;
        }
        if self.removed_count > 0 {
            write!(f, ", {} removed", self.removed_count)?;
        }
        if self.reboot_required {
            write!(f, ", reboot required")?;
        }
        Ok(())
    }
}

/// Package manager type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerType {
    /// APT (Debian/Ubuntu)
    Apt,
    /// DNF (Fedora/RHEL 8+)
    Dnf,
    /// YUM (CentOS 7/RHEL 7), driven through the dnf command set
    Yum,
}

impl std::fmt::Display for PackageManagerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageManagerType::Apt => write!(f, "apt"),
            PackageManagerType::Dnf => write!(f, "dnf"),
            PackageManagerType::Yum => write!(f, "yum"),
        }
    }
}

impl FromStr for PackageManagerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apt" | "apt-get" => Ok(PackageManagerType::Apt),
            "dnf" => Ok(PackageManagerType::Dnf),
            "yum" => Ok(PackageManagerType::Yum),
            other => Err(format!("unknown package manager '{other}'")),
        }
    }
}
