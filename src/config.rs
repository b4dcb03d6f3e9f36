//! Runtime configuration.
//!
//! Resolution order, highest first: CLI flags, `RELOC_LOG_DIR` (log dir
//! only), the JSON config file (`--config` or `RELOC_CONFIG`), built-in
//! defaults.

use crate::conflict::DEFAULT_MAX_RENAME_ATTEMPTS;
use crate::model::ConflictStrategy;
use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "RELOC_CONFIG";
pub const LOG_DIR_ENV: &str = "RELOC_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding one record per transaction.
    pub log_dir: PathBuf,
    /// Destination root when `--dest` is not given.
    pub dest_root: Option<PathBuf>,
    pub conflict: ConflictStrategy,
    pub max_rename_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            dest_root: None,
            conflict: ConflictStrategy::default(),
            max_rename_attempts: DEFAULT_MAX_RENAME_ATTEMPTS,
        }
    }
}

/// `<data dir>/reloc/transactions`, or `./.reloc/transactions` without one.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("reloc"))
        .unwrap_or_else(|| PathBuf::from(".reloc"))
        .join("transactions")
}

impl Config {
    /// Load from an explicit path, else `RELOC_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
            config.log_dir = PathBuf::from(dir);
        }
        config.absolutize_paths()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        if config.max_rename_attempts == 0 {
            anyhow::bail!("max_rename_attempts must be at least 1");
        }
        Ok(config)
    }

    fn absolutize_paths(&mut self) -> Result<()> {
        self.log_dir = absolute(&self.log_dir)?;
        if let Some(dest) = &self.dest_root {
            self.dest_root = Some(absolute(dest)?);
        }
        Ok(())
    }
}

/// Absolute form of `path` against the current directory, without touching disk.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("failed to resolve {}", path.display()))?
        .into_owned())
}
