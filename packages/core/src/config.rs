//! Wait configuration.
//!
//! The library never reads configuration on its own; callers build a
//! `WaitConfig` directly or load one from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{ConfigParseSnafu, IoResultExt, Result};
use crate::mtab::PROC_MOUNTS;

/// Number of unrelated mount table changes tolerated by default.
pub const DEFAULT_MAX_CHANGES: u8 = 5;

/// Tunables for `Waiter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Mount table to probe and watch.
    pub mount_table: PathBuf,
    /// Changes observed without reaching the target state before giving up.
    pub max_changes: u8,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            mount_table: PathBuf::from(PROC_MOUNTS),
            max_changes: DEFAULT_MAX_CHANGES,
        }
    }
}

impl WaitConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).config_read_context(path)?;
        serde_json::from_str(&content).context(ConfigParseSnafu { path })
    }
}
