//! Content-addressed result cache.
//!
//! One JSON file per fingerprint. Entries are immutable: any content,
//! profile or provider change produces a new fingerprint, so stale entries
//! are simply never read again. Writes go through a temp file and rename,
//! making concurrent same-key writes last-write-wins with no partially
//! written entry ever visible.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::findings::Finding;
use crate::prompts::PromptProfile;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    /// Provider+model id the findings came from.
    pub provider: String,
    pub created_at: String,
    pub findings: Vec<Finding>,
}

/// Filesystem-backed cache of per-file analysis results.
#[derive(Debug)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    /// Opens (and creates if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ScanError::Cache(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(ResultCache { dir })
    }

    /// Derives the cache key: sha256 over the normalized path, the content
    /// hash, the prompt profile and the provider id.
    pub fn fingerprint(
        path: &Path,
        content: &[u8],
        profile: PromptProfile,
        provider_id: &str,
    ) -> String {
        let content_hash = format!("{:x}", Sha256::digest(content));
        let normalized = path.to_string_lossy().replace('\\', "/");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"\n");
        hasher.update(content_hash.as_bytes());
        hasher.update(b"\n");
        hasher.update(profile.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(provider_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Looks up a fingerprint. Corrupt or mismatched entries degrade to a
    /// miss, never an error.
    pub fn get(&self, fingerprint: &str, provider_id: &str) -> Option<CacheEntry> {
        let path = self.entry_path(fingerprint);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache read failed");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry ignored");
                return None;
            }
        };
        if entry.provider != provider_id {
            debug!(
                fingerprint,
                stored = %entry.provider,
                requested = provider_id,
                "provider mismatch, treating as miss"
            );
            return None;
        }
        debug!(fingerprint, "cache hit");
        Some(entry)
    }

    /// Stores an entry atomically.
    pub fn put(&self, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_vec_pretty(entry)?;
        let tmp = self.dir.join(format!(
            ".{}.tmp-{}-{}",
            entry.fingerprint,
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let path = self.entry_path(&entry.fingerprint);
        std::fs::write(&tmp, &json)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                ScanError::Cache(format!("cannot write {}: {e}", path.display()))
            })?;
        debug!(fingerprint = %entry.fingerprint, "cache store");
        Ok(())
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }
}
