//! Per-node outcome of one operation invocation

use std::time::Duration;

use fleetops_exec::ExecError;
use fleetops_pkg::PackageError;
use serde::{Deserialize, Serialize};

/// Why a node failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Node unreachable or connection refused
    Connection,
    /// Authentication or key problem
    Authentication,
    /// Call exceeded the executor timeout
    Timeout,
    /// Remote command exited non-zero
    NonZeroExit,
    /// File copy failed
    Transfer,
    /// The operation panicked
    Panicked,
    /// Anything else
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NonZeroExit => "non_zero_exit",
            ErrorKind::Transfer => "transfer",
            ErrorKind::Panicked => "panicked",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl From<&ExecError> for ErrorKind {
    fn from(err: &ExecError) -> Self {
        match err {
            ExecError::ConnectionFailed(_) => ErrorKind::Connection,
            ExecError::AuthenticationFailed(_) | ExecError::SshKeyError(_) => {
                ErrorKind::Authentication
            }
            ExecError::Timeout { .. } => ErrorKind::Timeout,
            ExecError::CommandFailed { .. } => ErrorKind::NonZeroExit,
            ExecError::TransferFailed(_) => ErrorKind::Transfer,
            ExecError::SpawnError(_) | ExecError::IoError(_) | ExecError::ConfigError(_) => {
                ErrorKind::Other
            }
        }
    }
}

impl From<&PackageError> for ErrorKind {
    fn from(err: &PackageError) -> Self {
        match err {
            PackageError::Execution(e) => e.into(),
            PackageError::ManagerNotFound(_) => ErrorKind::Other,
            PackageError::RepositoryUnavailable(_)
            | PackageError::LockConflict(_)
            | PackageError::PermissionDenied(_)
            | PackageError::CommandFailed { .. } => ErrorKind::NonZeroExit,
        }
    }
}

/// Result of running one operation against one node
///
/// Exactly one is produced per node per dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Node the outcome belongs to
    pub hostname: String,
    /// Whether the operation succeeded on this node
    pub success: bool,
    /// Human-readable detail (output summary or error message)
    pub detail: String,
    /// Failure classification, `None` on success
    pub error: Option<ErrorKind>,
    /// Wall-clock time of the invocation, set by the dispatcher
    #[serde(default)]
    pub elapsed: Duration,
}

impl Outcome {
    /// Create a successful outcome
    pub fn success(hostname: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            success: true,
            detail: detail.into(),
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a failed outcome
    pub fn failed(hostname: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            success: false,
            detail: detail.into(),
            error: Some(kind),
            elapsed: Duration::ZERO,
        }
    }

    /// Failed outcome from a transport error
    pub fn from_exec_error(hostname: impl Into<String>, err: &ExecError) -> Self {
        Self::failed(hostname, err.into(), err.to_string())
    }

    /// Failed outcome from a package manager error
    pub fn from_package_error(hostname: impl Into<String>, err: &PackageError) -> Self {
        Self::failed(hostname, err.into(), err.to_string())
    }

    /// Set elapsed time
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}
