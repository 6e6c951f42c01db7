//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Default bound on a single remote call, connection included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Turn a non-zero exit status into `ExecError::CommandFailed`
    ///
    /// # Errors
    /// Returns `ExecError::CommandFailed` carrying the status and stderr when
    /// the command did not exit cleanly.
    pub fn into_checked(self) -> Result<Self, ExecError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecError::CommandFailed {
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Connection information for SSH
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Default port when an address carries none
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub user: String,
    /// Bound on connect plus command execution
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_port() -> u16 {
    22
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            port: default_port(),
            user: user.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set custom timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Split `address` into host and port, falling back to the default port
    ///
    /// Bracketed IPv6 (`[::1]:2222`) is supported. A bare IPv6 address is
    /// taken as a host without a port.
    #[must_use]
    pub fn host_port<'a>(&self, address: &'a str) -> (&'a str, u16) {
        if let Some(rest) = address.strip_prefix('[')
            && let Some(end) = rest.find(']')
        {
            let host = &rest[..end];
            let port = rest[end + 1..]
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(self.port);
            return (host, port);
        }

        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => match port.parse() {
                Ok(port) => (host, port),
                Err(_) => (address, self.port),
            },
            _ => (address, self.port),
        }
    }
}

/// Quote `value` for safe interpolation into a POSIX shell command
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
