//! Error taxonomy for the scanner.
//!
//! Fatal conditions (`ScanError`) abort the run; everything that can be
//! confined to one file or one unit is downgraded to a [`ScanWarning`]
//! and carried in the final result instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderError;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file is not valid UTF-8: {0}")]
    Decode(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Category tag for warnings, stable across renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Io,
    Decode,
    ProviderTimeout,
    ProviderTransient,
    ProviderFatal,
    Parse,
    Cache,
}

/// A non-fatal problem scoped to part of the scan.
///
/// `scope` names the affected file, or `path#unit-N` for a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub scope: String,
    pub kind: WarningKind,
    pub message: String,
}

impl ScanWarning {
    pub fn new(scope: impl Into<String>, kind: WarningKind, message: impl Into<String>) -> Self {
        ScanWarning {
            scope: scope.into(),
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_io() {
        let err = ScanError::Io {
            path: "/path/to/file".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "I/O error on /path/to/file");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_display_cache() {
        let err = ScanError::Cache("disk full".to_string());
        assert_eq!(err.to_string(), "cache error: disk full");
    }

    #[test]
    fn warning_kind_serializes_snake_case() {
        let json = serde_json::to_string(&WarningKind::ProviderTimeout).unwrap();
        assert_eq!(json, "\"provider_timeout\"");
    }
}
