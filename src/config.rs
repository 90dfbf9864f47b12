//! Configuration for the file store.
//!
//! Stored as TOML at:
//!   $FILER_CONFIG if set, otherwise
//!   $XDG_CONFIG_HOME/filer/config.toml on Linux
//!   ~/Library/Application Support/filer/config.toml on macOS
//!   %APPDATA%/filer/config.toml on Windows
//!
//! Every field has a default, so a missing or partial file is fine.

use anyhow::{Context, Result};
use directories::{BaseDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::layout::StorageRoots;
use crate::names::DEFAULT_MAX_ATTEMPTS;

/// Standard file name of the config file.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Places all storage roots under one directory when set.
pub const HOME_ENV: &str = "FILER_HOME";
/// Overrides the config file location when set.
pub const CONFIG_ENV: &str = "FILER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory created under each root area.
    #[serde(default = "default_product")]
    pub product: String,
    /// Threads in the background I/O pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Cap on candidate names tried by one allocation.
    #[serde(default = "default_max_name_attempts")]
    pub max_name_attempts: u32,
    #[serde(default)]
    pub roots: RootOverrides,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            worker_threads: default_worker_threads(),
            max_name_attempts: default_max_name_attempts(),
            roots: RootOverrides::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_product() -> String {
    "Filer".to_string()
}

const fn default_worker_threads() -> usize {
    4
}

const fn default_max_name_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Explicit replacements for the platform directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootOverrides {
    pub cache: Option<PathBuf>,
    pub documents: Option<PathBuf>,
    pub temp: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    if cfg!(debug_assertions) {
        "filer=debug".to_string()
    } else {
        "filer=info".to_string()
    }
}

impl StoreConfig {
    /// Resolves the three root areas.
    ///
    /// Order of precedence:
    /// 1. `FILER_HOME` environment variable.
    /// 2. Overrides from the config file.
    /// 3. OS directories via `directories`, and the system temp directory.
    pub fn resolve_roots(&self) -> Result<StorageRoots> {
        if let Ok(home) = env::var(HOME_ENV) {
            return Ok(StorageRoots::under(home));
        }
        let base_dirs = BaseDirs::new().context("Unable to determine OS home directories")?;
        let cache = self
            .roots
            .cache
            .clone()
            .unwrap_or_else(|| base_dirs.cache_dir().to_path_buf());
        let documents = match &self.roots.documents {
            Some(path) => path.clone(),
            None => UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|dir| dir.to_path_buf()))
                .unwrap_or_else(|| base_dirs.data_dir().to_path_buf()),
        };
        let temp = self.roots.temp.clone().unwrap_or_else(env::temp_dir);
        Ok(StorageRoots {
            cache,
            documents,
            temp,
        })
    }
}

/// Path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS config directory")?;
    Ok(base_dirs.config_dir().join("filer").join(CONFIG_FILE_NAME))
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default() -> Result<StoreConfig> {
    let path = config_file_path()?;
    if path.exists() {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: StoreConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(StoreConfig::default())
    }
}

/// Persists the configuration to disk.
pub fn save(config: &StoreConfig) -> Result<()> {
    let path = config_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let data = toml::to_string_pretty(config)?;
    fs::write(&path, data)?;
    Ok(())
}
