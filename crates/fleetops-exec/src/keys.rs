//! SSH key management and resolution

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

/// Private key file names tried by `KeySource::Default`, in order
const DEFAULT_KEY_NAMES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

static TEMP_KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SSH key resolution strategy
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key from environment
    Env(String),
    /// First of `~/.ssh/id_ed25519`, `id_ecdsa`, `id_rsa` that exists
    Default,
}

impl KeySource {
    /// Resolve key source to a key file on disk
    ///
    /// For `Env`, decodes base64 and writes to a temp file that is removed
    /// when the `ResolvedKey` is dropped.
    ///
    /// # Errors
    /// Returns `KeyError` if key resolution fails (env not set, invalid base64,
    /// missing file, permissions too open)
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                let path = expand_home(path)?;
                validate_key_permissions(&path)?;
                Ok(ResolvedKey::Path(path))
            }
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;

                let temp_path = write_temp_key(&key_data)?;
                Ok(ResolvedKey::Temp(temp_path))
            }
            KeySource::Default => {
                let ssh_dir = dirs::home_dir().ok_or(KeyError::NoHomeDir)?.join(".ssh");
                let path = DEFAULT_KEY_NAMES
                    .iter()
                    .map(|name| ssh_dir.join(name))
                    .find(|p| p.is_file())
                    .ok_or_else(|| KeyError::NotFound(ssh_dir.display().to_string()))?;
                validate_key_permissions(&path)?;
                Ok(ResolvedKey::Path(path))
            }
        }
    }
}

/// Resolved key location
#[derive(Debug)]
pub enum ResolvedKey {
    /// Path to key file
    Path(PathBuf),
    /// Temporary file (will be deleted on drop)
    Temp(PathBuf),
}

impl ResolvedKey {
    /// Get path for SSH library
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ResolvedKey::Path(p) | ResolvedKey::Temp(p) => p,
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("cannot determine home directory to expand ~")]
    NoHomeDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn expand_home(path: &Path) -> Result<PathBuf, KeyError> {
    expand_with_home(path, dirs::home_dir)
}

fn expand_with_home(
    path: &Path,
    home: impl FnOnce() -> Option<PathBuf>,
) -> Result<PathBuf, KeyError> {
    match path.strip_prefix("~") {
        Ok(rest) => home()
            .map(|home| home.join(rest))
            .ok_or(KeyError::NoHomeDir),
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
        _ => KeyError::Io(e),
    })?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

fn write_temp_key(key_data: &[u8]) -> Result<PathBuf, KeyError> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let seq = TEMP_KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path =
        env::temp_dir().join(format!("fleetops_ssh_key_{}_{seq}", std::process::id()));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&temp_path)?;
    file.write_all(key_data)?;

    debug!(path = %temp_path.display(), "wrote temporary SSH key");

    Ok(temp_path)
}

impl Drop for ResolvedKey {
    fn drop(&mut self) {
        if let ResolvedKey::Temp(path) = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!(path = %path.display(), error = %e, "failed to remove temp key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_written_and_removed() {
        use base64::Engine;

        let var = format!("FLEETOPS_TEST_KEY_{}", std::process::id());
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"not-a-real-key");
        // SAFETY: test-local variable name, no other thread reads it
        unsafe { env::set_var(&var, encoded) };

        let resolved = KeySource::Env(var.clone()).resolve().unwrap();
        let path = resolved.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"not-a-real-key");

        drop(resolved);
        assert!(!path.exists());
        unsafe { env::remove_var(&var) };
    }

    #[test]
    fn test_env_not_set() {
        let err = KeySource::Env("FLEETOPS_SURELY_UNSET_VAR".into())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, KeyError::EnvNotSet(_)));
    }

    #[test]
    fn test_bad_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let path = env::temp_dir().join(format!("fleetops_open_key_{}", std::process::id()));
        std::fs::write(&path, b"key").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = KeySource::Path(path.clone()).resolve().unwrap_err();
        assert!(matches!(err, KeyError::BadPermissions(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let path = expand_with_home(Path::new("~/.ssh/id_ed25519"), || {
            Some(PathBuf::from("/home/ops"))
        })
        .unwrap();
        assert_eq!(path, PathBuf::from("/home/ops/.ssh/id_ed25519"));
    }

    #[test]
    fn test_tilde_without_home_is_error() {
        let err = expand_with_home(Path::new("~/.ssh/id_rsa"), || None).unwrap_err();
        assert!(matches!(err, KeyError::NoHomeDir));
    }

    #[test]
    fn test_absolute_path_needs_no_home() {
        let path = expand_with_home(Path::new("/etc/fleetops/key"), || None).unwrap();
        assert_eq!(path, PathBuf::from("/etc/fleetops/key"));
    }

    #[test]
    fn test_missing_path() {
        let err = KeySource::Path("/nonexistent/fleetops/key".into())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, KeyError::NotFound(_)));
    }
}
