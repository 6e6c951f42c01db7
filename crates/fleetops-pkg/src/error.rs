//! Error types for fleetops-pkg

use fleetops_exec::ExecError;
use thiserror::Error;

/// Errors that can occur during package operations
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// No supported package manager on the node
    #[error("package manager not found: {0}")]
    ManagerNotFound(String),

    /// Repository is unavailable
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Lock file conflict (another process running)
    #[error("lock file conflict: {0}")]
    LockConflict(String),

    /// Insufficient permissions (need sudo)
    #[error("insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Command exited non-zero for another reason
    #[error("command failed: {status} - {message}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Transport error from the remote executor
    #[error("execution error: {0}")]
    Execution(#[from] ExecError),
}

impl PackageError {
    /// Classify a failed package command from its exit status and stderr
    #[must_use]
    pub fn from_failure(status: i32, stderr: &str) -> Self {
        let message = stderr.trim().to_string();

        if stderr.contains("Could not get lock") || stderr.contains("lock") {
            PackageError::LockConflict(message)
        } else if stderr.contains("Permission denied") || stderr.contains("are you root?") {
            PackageError::PermissionDenied(message)
        } else if stderr.contains("Failed to fetch")
            || stderr.contains("Temporary failure resolving")
            || stderr.contains("Cannot download repomd.xml")
        {
            PackageError::RepositoryUnavailable(message)
        } else {
            PackageError::CommandFailed { status, message }
        }
    }
}
