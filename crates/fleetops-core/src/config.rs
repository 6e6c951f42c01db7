//! Dispatch configuration types

use std::num::NonZeroUsize;
use std::str::FromStr;

use fleetops_pkg::PackageManagerType;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum number of operations in flight at once
///
/// Always at least 1. Values below 1 are rejected, not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ConcurrencyLimit(NonZeroUsize);

impl ConcurrencyLimit {
    /// Default number of nodes processed in parallel
    pub const DEFAULT: ConcurrencyLimit = ConcurrencyLimit(NonZeroUsize::new(10).unwrap());

    /// Create a limit
    ///
    /// # Errors
    /// Returns `CoreError::InvalidConcurrency` if `limit` is 0
    pub fn new(limit: usize) -> Result<Self, CoreError> {
        NonZeroUsize::new(limit)
            .map(Self)
            .ok_or(CoreError::InvalidConcurrency(limit))
    }

    /// The limit as a plain number
    #[must_use]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for ConcurrencyLimit {
    type Error = CoreError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConcurrencyLimit> for usize {
    fn from(limit: ConcurrencyLimit) -> Self {
        limit.get()
    }
}

impl std::fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the update operation picks a package manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManagerChoice {
    /// Probe each node
    #[default]
    Auto,
    /// Use this manager on every node
    Fixed(PackageManagerType),
}

impl FromStr for ManagerChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(ManagerChoice::Auto)
        } else {
            s.parse().map(ManagerChoice::Fixed)
        }
    }
}

/// Settings shared by operations that need elevated privileges
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegeSettings {
    /// Prefix privileged commands with sudo
    pub use_sudo: bool,
    /// Package manager selection for updates
    pub manager: ManagerChoice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rejected() {
        assert_eq!(
            ConcurrencyLimit::new(0),
            Err(CoreError::InvalidConcurrency(0))
        );
        assert_eq!(ConcurrencyLimit::new(3).unwrap().get(), 3);
    }

    #[test]
    fn test_serde_rejects_zero() {
        let limit: ConcurrencyLimit = serde_json::from_str("4").unwrap();
        assert_eq!(limit.get(), 4);
        assert!(serde_json::from_str::<ConcurrencyLimit>("0").is_err());
    }

    #[test]
    fn test_manager_choice() {
        assert_eq!("auto".parse::<ManagerChoice>().unwrap(), ManagerChoice::Auto);
        assert_eq!(
            "dnf".parse::<ManagerChoice>().unwrap(),
            ManagerChoice::Fixed(PackageManagerType::Dnf)
        );
        assert!("pacman".parse::<ManagerChoice>().is_err());
    }
}
