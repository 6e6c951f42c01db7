//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use fleetops_core::{ConcurrencyLimit, ManagerChoice, PrivilegeSettings};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "FLEETOPS_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Nodes processed in parallel
    #[serde(default)]
    pub concurrency: ConcurrencyLimit,
    /// Per-call executor timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyLimit::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// SSH transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Private key file; `~` is expanded
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Environment variable holding a base64 private key
    #[serde(default)]
    pub key_env: Option<String>,
    /// Prefix privileged commands with sudo
    #[serde(default)]
    pub sudo: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            port: default_port(),
            key_path: None,
            key_env: None,
            sudo: false,
        }
    }
}

/// Inventory source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_path")]
    pub path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: default_inventory_path(),
        }
    }
}

/// Package update settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// `auto`, `apt`, `dnf` or `yum`
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            package_manager: default_package_manager(),
        }
    }
}

/// Logging and report output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: default_log_dir(),
            report_dir: default_report_dir(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("nodes.conf")
}

fn default_package_manager() -> String {
    "auto".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error on malformed TOML or invalid values
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.privileges()?;
        Ok(config)
    }

    /// Find the config file to use
    ///
    /// Lookup order: `explicit`, `$FLEETOPS_CONFIG`, `./fleetops.toml`,
    /// `/etc/fleetops/fleetops.toml`, then the user config directory.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let paths = [
            Some(PathBuf::from("fleetops.toml")),
            Some(PathBuf::from("/etc/fleetops/fleetops.toml")),
            dirs::config_dir().map(|p| p.join("fleetops/fleetops.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Privilege settings for the built-in operations
    ///
    /// # Errors
    /// Returns error if `update.package_manager` is not recognised
    pub fn privileges(&self) -> eyre::Result<PrivilegeSettings> {
        let manager: ManagerChoice = self
            .update
            .package_manager
            .parse()
            .map_err(|e: String| eyre::eyre!("update.package_manager: {e}"))?;
        Ok(PrivilegeSettings {
            use_sudo: self.ssh.sudo,
            manager,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetops_pkg::PackageManagerType;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.dispatch.concurrency.get(), 10);
        assert_eq!(config.dispatch.timeout(), Duration::from_secs(10));
        assert_eq!(config.ssh.user, "root");
        assert_eq!(config.ssh.port, 22);
        assert!(!config.ssh.sudo);
        assert_eq!(config.inventory.path, PathBuf::from("nodes.conf"));
        assert_eq!(config.logging.report_dir, PathBuf::from("reports"));
        assert_eq!(config.privileges().unwrap().manager, ManagerChoice::Auto);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [dispatch]
            concurrency = 4
            timeout_secs = 30

            [ssh]
            user = "deploy"
            port = 2222
            key_env = "FLEETOPS_SSH_KEY"
            sudo = true

            [inventory]
            path = "/etc/fleetops/nodes.conf"

            [update]
            package_manager = "dnf"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.concurrency.get(), 4);
        assert_eq!(config.ssh.key_env.as_deref(), Some("FLEETOPS_SSH_KEY"));
        let privileges = config.privileges().unwrap();
        assert!(privileges.use_sudo);
        assert_eq!(
            privileges.manager,
            ManagerChoice::Fixed(PackageManagerType::Dnf)
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Config::parse("[dispatch]\nconcurrency = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("concurrency"));
    }

    #[test]
    fn test_unknown_package_manager_rejected() {
        assert!(Config::parse("[update]\npackage_manager = \"pacman\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetops.toml");
        std::fs::write(&path, "[ssh]\nuser = \"ops\"\n").unwrap();

        let config = Config::load(&Config::locate(Some(&path)).unwrap()).unwrap();
        assert_eq!(config.ssh.user, "ops");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load(Path::new("/nonexistent/fleetops.toml")).is_err());
    }
}
