//! fleetops-exec: Remote execution abstraction
//!
//! Provides the `RemoteExecutor` capability and its implementations for
//! running commands and copying files locally and over SSH.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, ResolvedKey};
pub use local::LocalExecutor;
pub use result::{CommandResult, ConnectionInfo, DEFAULT_TIMEOUT, shell_quote};
pub use ssh::{SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;
