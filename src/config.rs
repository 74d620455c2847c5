//! Optional project configuration file, merged under CLI flags.
//!
//! CLI flags always win; the file only supplies values the user did not
//! pass. A missing file is the normal case and silently yields defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Project-level configuration, `.code-sentinel.yaml` at the scan root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extensions to scan (replaces the built-in set when non-empty).
    pub extensions: Vec<String>,
    /// Extra path-segment ignore patterns.
    pub ignore: Vec<String>,
    /// Provider name: "ollama", "groq" or "huggingface".
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Prompt profile: "standard", "detailed" or "quick".
    pub prompt: Option<String>,
    pub workers: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub max_unit_bytes: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Loads `.code-sentinel.yaml` (or `.yml`) from the scan root. An
    /// unreadable or invalid file logs a warning and yields defaults.
    pub fn load(root: Option<&Path>) -> Self {
        let Some(root) = root else {
            return Self::default();
        };
        let dir = if root.is_file() {
            root.parent().unwrap_or(Path::new("."))
        } else {
            root
        };
        for filename in [".code-sentinel.yaml", ".code-sentinel.yml"] {
            let path = dir.join(filename);
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => return config,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring invalid config file");
                }
            }
        }
        Self::default()
    }
}
