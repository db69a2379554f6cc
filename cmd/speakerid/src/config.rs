//! CLI configuration, stored in ~/.speakerid/config.yaml.
//!
//! ```yaml
//! db_path: /var/lib/speakerid/speakers.redb
//! dim: 192
//! default_threshold: 0.65
//! aggregation: max
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Base directory under the user's home.
pub const DEFAULT_BASE_DIR: &str = ".speakerid";
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_DB_FILE: &str = "speakers.redb";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. Defaults to ~/.speakerid/data/speakers.redb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// Engine settings, inlined at the top level of the file.
    #[serde(flatten)]
    pub engine: speakerid::Config,
}

impl Config {
    /// Returns ~/.speakerid.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    pub fn default_db_path() -> Option<PathBuf> {
        Self::default_dir().map(|dir| dir.join("data").join(DEFAULT_DB_FILE))
    }

    /// Database path, preferring `flag` over the file value over the default.
    pub fn resolve_db_path(&self, flag: Option<&str>) -> anyhow::Result<PathBuf> {
        if let Some(p) = flag {
            return Ok(PathBuf::from(p));
        }
        if let Some(p) = &self.db_path {
            return Ok(p.clone());
        }
        Self::default_db_path().ok_or_else(|| anyhow::anyhow!("cannot determine database path"))
    }
}

/// Loads configuration from `custom_path`, or the default location.
///
/// An explicit path must exist. A missing default file yields the defaults.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    match custom_path {
        Some(p) => read_config(Path::new(p)),
        None => {
            let path = Config::default_config_path()
                .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?;
            if path.exists() {
                read_config(&path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&content).with_context(|| format!("parse config {}", path.display()))
}
