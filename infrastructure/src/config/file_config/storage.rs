//! Storage configuration from TOML (`[storage]` section)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw storage configuration from TOML
///
/// # Example
///
/// ```toml
/// [storage]
/// enabled = true
/// directory = "~/.local/share/consensus-engine/discussions"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Persist discussions to disk; when false they live in memory only
    pub enabled: bool,
    /// Directory holding one JSONL file per discussion
    pub directory: Option<PathBuf>,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

impl FileStorageConfig {
    /// Configured directory, or `$XDG_DATA_HOME/consensus-engine/discussions`
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        match &self.directory {
            Some(dir) => Some(expand_home(dir)),
            None => dirs::data_dir().map(|d| d.join("consensus-engine").join("discussions")),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
