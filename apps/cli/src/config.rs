//! CLI configuration management.
//!
//! Configuration is stored as JSON:
//! - Linux: `~/.config/nasferry/config.json`
//! - Windows: `%APPDATA%/nasferry/config.json`

use std::path::{Path, PathBuf};
use std::time::Duration;

use nasferry_sessions::{ArchiveConfig, ParallelConfig, SequentialConfig};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Base URL of the file service, e.g. `http://nas.local:5000`.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Stop polling an archive job after this many checks.
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,

    /// Delete the partial remote file when a sequential upload is cancelled.
    #[serde(default = "default_true")]
    pub compensating_delete: bool,

    #[serde(default = "default_cleanup_delay_ms")]
    pub cleanup_delay_ms: u64,

    /// Limit on simultaneous uploads in folder mode.
    #[serde(default)]
    pub max_parallel_uploads: Option<usize>,

    /// Where finished archives are saved. Empty means the working directory.
    #[serde(default)]
    pub download_dir: String,
}

fn default_server_url() -> String {
    "http://localhost:5000".into()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_cleanup_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: None,
            compensating_delete: true,
            cleanup_delay_ms: default_cleanup_delay_ms(),
            max_parallel_uploads: None,
            download_dir: String::new(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from `path`.
    ///
    /// A missing file yields defaults. An unparsable file is logged and
    /// also yields defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<CliConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Saves configuration to the default location.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn sequential(&self) -> SequentialConfig {
        SequentialConfig {
            compensating_delete: self.compensating_delete,
            cleanup_delay: Duration::from_millis(self.cleanup_delay_ms),
        }
    }

    pub fn parallel(&self) -> ParallelConfig {
        ParallelConfig {
            max_concurrent: self.max_parallel_uploads,
        }
    }

    pub fn archive(&self) -> ArchiveConfig {
        ArchiveConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_poll_attempts: self.max_poll_attempts,
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        if self.download_dir.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&self.download_dir)
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("nasferry")
            .join("config.json"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("nasferry").join("config.json"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/nasferry/config.json"))
    }
}
