//! SSH command execution using russh crate

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ExecError;
use crate::keys::KeySource;
use crate::result::{CommandResult, ConnectionInfo, shell_quote};
use crate::traits::RemoteExecutor;

type SessionHandle = Arc<client::Handle<SshClientHandler>>;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// Output collected from a finished exec channel
struct ChannelOutput {
    status: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// SSH executor for a whole fleet
///
/// Holds one authenticated session per address. Sessions are opened on first
/// use and reused by later calls; a session that can no longer open channels
/// is dropped and reconnected once.
pub struct SshExecutor {
    /// Connection configuration shared by all nodes
    conn_info: ConnectionInfo,
    /// Private key used for public key authentication
    key: Arc<PrivateKey>,
    /// Open sessions keyed by address
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// # Arguments
    /// * `conn_info` - Connection details (user, default port, timeout)
    /// * `key_source` - How to obtain the SSH key
    ///
    /// # Errors
    /// Returns `ExecError::SshKeyError` if the key cannot be resolved or loaded
    pub fn new(conn_info: ConnectionInfo, key_source: &KeySource) -> Result<Self, ExecError> {
        let resolved = key_source
            .resolve()
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        // Load eagerly so a temp key file can be removed right after
        let key = load_secret_key(resolved.path(), None)
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        Ok(Self {
            conn_info,
            key: Arc::new(key),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Connect and authenticate to `address`
    #[instrument(skip(self))]
    async fn connect(&self, address: &str) -> Result<client::Handle<SshClientHandler>, ExecError> {
        let (host, port) = self.conn_info.host_port(address);

        info!(
            host = %host,
            port = port,
            user = %self.conn_info.user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());

        let mut session = client::connect(config, (host, port), SshClientHandler)
            .await
            .map_err(|e| ExecError::ConnectionFailed(format!("{address}: {e}")))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &self.conn_info.user,
                PrivateKeyWithHashAlg::new(Arc::clone(&self.key), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "public key rejected for {}@{address}",
                self.conn_info.user
            )));
        }

        info!(host = %host, "SSH connected and authenticated");

        Ok(session)
    }

    /// Get a pooled session for `address`, connecting if needed
    async fn session(&self, address: &str) -> Result<SessionHandle, ExecError> {
        {
            let sessions = self.sessions.lock().await;
            if let Some(handle) = sessions.get(address)
                && !handle.is_closed()
            {
                return Ok(Arc::clone(handle));
            }
        }

        // Connect without holding the pool lock so other nodes are not serialized
        let handle = Arc::new(self.connect(address).await?);
        self.sessions
            .lock()
            .await
            .insert(address.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    async fn evict(&self, address: &str) {
        if self.sessions.lock().await.remove(address).is_some() {
            debug!(address = %address, "evicted stale SSH session");
        }
    }

    /// Open an exec channel, reconnecting once on a stale session
    async fn open_channel(&self, address: &str) -> Result<Channel<client::Msg>, ExecError> {
        let session = self.session(address).await?;
        match session.channel_open_session().await {
            Ok(channel) => Ok(channel),
            Err(e) => {
                warn!(address = %address, error = %e, "channel open failed, reconnecting");
                self.evict(address).await;
                let session = self.session(address).await?;
                session
                    .channel_open_session()
                    .await
                    .map_err(|e| ExecError::IoError(e.to_string()))
            }
        }
    }

    /// Drain a channel until EOF, collecting output and exit status
    async fn collect(channel: &mut Channel<client::Msg>) -> ChannelOutput {
        let mut output = ChannelOutput {
            status: -1,
            stdout: Vec::new(),
            stderr: Vec::new(),
        };

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => output.stdout.extend_from_slice(&data),
                // ext 1 is stderr
                ChannelMsg::ExtendedData { data, ext: 1 } => {
                    output.stderr.extend_from_slice(&data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    output.status = exit_status.cast_signed();
                }
                _ => {}
            }
        }

        output
    }

    async fn execute_remote(&self, address: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();
        let mut channel = self.open_channel(address).await?;

        debug!(address = %address, command = %cmd, "executing remote command");

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let output = Self::collect(&mut channel).await;
        let duration = start.elapsed();

        debug!(
            address = %address,
            status = output.status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration,
        })
    }

    async fn upload(&self, address: &str, data: &[u8], remote_path: &str) -> Result<(), ExecError> {
        let mut channel = self.open_channel(address).await?;

        channel
            .exec(true, format!("cat > {}", shell_quote(remote_path)))
            .await
            .map_err(|e| ExecError::TransferFailed(e.to_string()))?;
        channel
            .data(data)
            .await
            .map_err(|e| ExecError::TransferFailed(e.to_string()))?;
        channel
            .eof()
            .await
            .map_err(|e| ExecError::TransferFailed(e.to_string()))?;

        let output = Self::collect(&mut channel).await;
        if output.status != 0 {
            return Err(ExecError::TransferFailed(format!(
                "remote write to {remote_path} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(address = %address, bytes = data.len(), to = %remote_path, "file uploaded");
        Ok(())
    }

    /// Bound `fut` by the configured timeout
    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, ExecError>>,
    ) -> Result<T, ExecError> {
        let start = Instant::now();
        match timeout(self.conn_info.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    operation = %what,
                    timeout = ?self.conn_info.timeout,
                    elapsed = ?start.elapsed(),
                    "SSH call timed out"
                );
                Err(ExecError::Timeout {
                    timeout: self.conn_info.timeout,
                })
            }
        }
    }

    /// Disconnect every pooled session
    pub async fn disconnect_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().await.drain().collect();

        for (address, session) in sessions {
            if let Err(e) = session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
            {
                warn!(address = %address, error = %e, "SSH disconnect failed");
            } else {
                info!(address = %address, "SSH disconnected");
            }
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, cmd))]
    async fn run_command(&self, address: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        self.bounded("run_command", self.execute_remote(address, cmd))
            .await
    }

    #[instrument(skip(self))]
    async fn copy_file(
        &self,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), ExecError> {
        let data = tokio::fs::read(local_path).await.map_err(|e| {
            ExecError::TransferFailed(format!("cannot read {}: {e}", local_path.display()))
        })?;

        self.bounded("copy_file", self.upload(address, &data, remote_path))
            .await
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Builder for `SshExecutor`
pub struct SshExecutorBuilder {
    conn_info: ConnectionInfo,
    key_source: KeySource,
}

impl SshExecutorBuilder {
    /// Create builder with the remote user
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            conn_info: ConnectionInfo::new(user),
            key_source: KeySource::Default,
        }
    }

    /// Set SSH key path
    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.key_source = KeySource::Path(path.into());
        self
    }

    /// Set key from environment variable (base64)
    #[must_use]
    pub fn with_env_key(mut self, var_name: impl Into<String>) -> Self {
        self.key_source = KeySource::Env(var_name.into());
        self
    }

    /// Set default port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.conn_info.port = port;
        self
    }

    /// Set per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.conn_info.timeout = timeout;
        self
    }

    /// Build the executor
    ///
    /// # Errors
    /// Returns `ExecError::SshKeyError` if key resolution fails
    pub fn build(self) -> Result<SshExecutor, ExecError> {
        SshExecutor::new(self.conn_info, &self.key_source)
    }
}
