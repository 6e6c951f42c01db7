//! Error types for fleetops-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during remote execution
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command exited with a non-zero status
    #[error("command execution failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// File transfer failed
    #[error("file transfer failed: {0}")]
    TransferFailed(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ExecError::Timeout {
            timeout: Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_display() {
        let err = ExecError::CommandFailed {
            status: 100,
            stderr: "E: Unable to locate package".into(),
        };
        assert_eq!(
            err.to_string(),
            "command execution failed: 100 - E: Unable to locate package"
        );
    }
}
