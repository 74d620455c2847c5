//! Scan target discovery: directory traversal, ignore filtering and
//! extension-based selection.
//!
//! Selection is deterministic for a given filesystem snapshot: targets come
//! back sorted by path regardless of traversal order. Unreadable
//! subdirectories never abort a scan, they are recorded as warnings.

pub mod language;

pub use language::Language;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScanError, ScanWarning, WarningKind};

/// Default directory/segment names that are never scanned.
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".env",
    "target",
    "dist",
    "build",
    ".idea",
    ".vscode",
    "vendor",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
];

/// Default source extensions (no dot, lowercase).
const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "mjs", "java", "kt", "kts", "go", "rs", "c", "h", "cpp", "cc",
    "cxx", "hpp", "cs", "php", "rb", "swift", "scala", "sql", "sh", "bash",
];

/// Name of the optional per-project ignore file, gitignore syntax.
const IGNORE_FILE: &str = ".code-sentinelignore";

/// A single file selected for scanning.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub path: PathBuf,
    pub language: Language,
    pub size: u64,
}

/// The outcome of target discovery.
#[derive(Debug, Default)]
pub struct Selection {
    pub targets: Vec<Arc<ScanTarget>>,
    pub warnings: Vec<ScanWarning>,
}

/// Walks a root path and selects the files worth sending to a model.
#[derive(Debug, Clone)]
pub struct FileSelector {
    extensions: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl Default for FileSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSelector {
    pub fn new() -> Self {
        FileSelector {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replaces the extension set. Entries may carry a leading dot.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Appends ignore patterns to the default set.
    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore_patterns
            .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));
        self
    }

    /// Discovers scan targets under `root`, which may be a single file.
    ///
    /// A missing root is the only fatal outcome; unreadable entries below it
    /// are downgraded to warnings.
    pub fn select(&self, root: &Path) -> Result<Selection> {
        if !root.exists() {
            return Err(ScanError::Io {
                path: root.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "path does not exist"),
            });
        }

        let mut selection = Selection::default();
        let gitignore = load_ignore_file(root);

        if root.is_file() {
            if self.matches_extension(root) && !self.path_ignored(root) {
                self.push_target(&mut selection, root.to_path_buf());
            }
            return Ok(selection);
        }

        let walker = WalkDir::new(root).follow_links(false).into_iter();
        let mut entries = Vec::new();
        let mut it = walker.filter_entry(|entry| {
            // Pruning here makes exclusion inherited by everything below.
            entry.depth() == 0 || !self.segment_ignored(&entry.file_name().to_string_lossy())
        });
        while let Some(result) = it.next() {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        entries.push(entry.into_path());
                    }
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    warn!(path = %path, error = %err, "skipping unreadable entry");
                    selection.warnings.push(ScanWarning::new(
                        path,
                        WarningKind::Io,
                        err.to_string(),
                    ));
                }
            }
        }

        for path in entries {
            if !self.matches_extension(&path) {
                continue;
            }
            if let Some(ref ignore) = gitignore {
                if ignore.matched_path_or_any_parents(&path, false).is_ignore() {
                    debug!(path = %path.display(), "excluded by ignore file");
                    continue;
                }
            }
            self.push_target(&mut selection, path);
        }

        selection.targets.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            targets = selection.targets.len(),
            warnings = selection.warnings.len(),
            "target discovery complete"
        );
        Ok(selection)
    }

    fn push_target(&self, selection: &mut Selection, path: PathBuf) {
        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(err) => {
                selection.warnings.push(ScanWarning::new(
                    path.display().to_string(),
                    WarningKind::Io,
                    err.to_string(),
                ));
                return;
            }
        };
        let language = path
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        selection.targets.push(Arc::new(ScanTarget {
            path,
            language,
            size,
        }));
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }

    // Exact match on the segment name, so `env` does not swallow
    // `environment.py`.
    fn segment_ignored(&self, segment: &str) -> bool {
        self.ignore_patterns.iter().any(|p| segment == p)
    }

    fn path_ignored(&self, path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| self.segment_ignored(s))
                .unwrap_or(false)
        })
    }
}

/// Loads `.code-sentinelignore` from the scan root when present.
fn load_ignore_file(root: &Path) -> Option<Gitignore> {
    let dir = if root.is_file() { root.parent()? } else { root };
    let ignore_path = dir.join(IGNORE_FILE);
    if !ignore_path.exists() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(dir);
    if let Some(err) = builder.add(&ignore_path) {
        warn!(path = %ignore_path.display(), error = %err, "failed to parse ignore file");
        return None;
    }
    match builder.build() {
        Ok(gi) => Some(gi),
        Err(err) => {
            warn!(error = %err, "failed to build ignore matcher");
            None
        }
    }
}
