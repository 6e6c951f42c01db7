//! fleetops-pkg: Package manager abstraction
//!
//! Provides refresh/upgrade command sequences for apt and dnf, detection of
//! the manager present on a node, and parsing of upgrade summaries.

pub mod apt;
pub mod detect;
pub mod dnf;
pub mod error;
pub mod traits;
pub mod types;

pub use apt::AptManager;
pub use detect::{DETECT_CMD, detect, for_type, from_probe_output};
pub use dnf::DnfManager;
pub use error::PackageError;
pub use traits::PackageManager;
pub use types::{PackageManagerType, UpdateKind, UpgradeSummary};
