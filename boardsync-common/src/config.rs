//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the data root folder
pub const ROOT_FOLDER_ENV: &str = "BOARDSYNC_ROOT_FOLDER";

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE: &str = "boardsync.db";

/// Resolve the data root folder.
///
/// Priority: CLI argument, then environment variable, then the `root_folder`
/// key of the TOML config file (only when `use_config_file` is set), then the
/// OS default data directory.
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    use_config_file: bool,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if use_config_file {
        if let Some(root) = find_config_file()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|content| toml::from_str::<toml::Value>(&content).ok())
            .and_then(|value| value.get("root_folder")?.as_str().map(PathBuf::from))
        {
            return root;
        }
    }

    default_root_folder()
}

/// First existing config file: user config dir, then /etc
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("boardsync").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/boardsync/config.toml");
    system_config.exists().then_some(system_config)
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("boardsync"))
        .unwrap_or_else(|| PathBuf::from("./boardsync_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Tunables of a reconciliation pass, read from the `[sync]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Proposals fetched per page
    pub page_size: u32,
    /// Upper bound of proposals visited in one pass
    pub max_records_per_pass: u32,
    /// Concurrent per-record writers within a page
    pub worker_count: usize,
    /// Broadcast buffer of the event bus
    pub event_capacity: usize,
    /// HTTP port of `boardsync serve`
    pub port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_records_per_pass: 10_000,
            worker_count: 4,
            event_capacity: 1000,
            port: 5790,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sync: SyncConfig,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.worker_count == 0 {
            return Err(Error::Config("worker_count must be at least 1".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        if self.max_records_per_pass < self.page_size {
            return Err(Error::Config(format!(
                "max_records_per_pass ({}) is smaller than page_size ({})",
                self.max_records_per_pass, self.page_size
            )));
        }
        Ok(())
    }

    /// Parse the `[sync]` table of a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        file.sync.validate()?;
        Ok(file.sync)
    }

    /// Load from a config file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using default sync settings");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from the discovered config file, or defaults when there is none
    pub fn discover() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
