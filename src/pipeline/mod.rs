//! Concurrent scan orchestration.
//!
//! One task per file, bounded by a semaphore. Workers share only the cache
//! and their own warning lists; everything else is message-passed back
//! through the join set, so completion order never leaks into the result.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, FileScan};
use crate::cache::{CacheEntry, ResultCache};
use crate::chunker::{chunk_content, CodeUnit};
use crate::discovery::{FileSelector, ScanTarget};
use crate::error::{Result, ScanWarning, WarningKind};
use crate::findings::{ScanResult, ScanStatus};
use crate::parser::parse_response;
use crate::prompts::{build_prompt, PromptProfile};
use crate::provider::retry::{call_with_retry, RetryPolicy};
use crate::provider::{Provider, ProviderRequest};

/// Cooperative cancellation shared across workers.
///
/// Checked before starting a file, before each unit, and before every
/// backoff sleep. Work already finished is kept.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum files analyzed concurrently.
    pub workers: usize,
    /// Chunking budget per code unit, in bytes.
    pub max_unit_bytes: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub profile: PromptProfile,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_unit_bytes: 16 * 1024,
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            profile: PromptProfile::Standard,
        }
    }
}

/// The full scan pipeline: discovery, cache, provider, parse, aggregate.
pub struct ScanPipeline {
    provider: Arc<dyn Provider>,
    cache: Option<Arc<ResultCache>>,
    selector: FileSelector,
    aggregator: Aggregator,
    options: ScanOptions,
}

impl ScanPipeline {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        ScanPipeline {
            provider,
            cache: None,
            selector: FileSelector::new(),
            aggregator: Aggregator::default(),
            options: ScanOptions::default(),
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn with_selector(mut self, selector: FileSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs the scan. Fatal only when the root cannot be resolved; every
    /// per-file problem becomes a warning in the result.
    pub async fn run(&self, root: &Path, cancel: &CancelFlag) -> Result<ScanResult> {
        let selection = self.selector.select(root)?;
        info!(
            root = %root.display(),
            files = selection.targets.len(),
            provider = %self.provider.id(),
            "starting scan"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut set: JoinSet<Option<FileScan>> = JoinSet::new();
        for target in selection.targets {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let cache = self.cache.clone();
            let options = self.options.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if cancel.is_cancelled() {
                    return None;
                }
                Some(scan_file(provider, cache, options, target, cancel).await)
            });
        }

        let mut scans = Vec::new();
        let mut warnings = selection.warnings;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Some(scan)) => scans.push(scan),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "scan worker panicked");
                    warnings.push(ScanWarning::new("worker", WarningKind::Io, err.to_string()));
                }
            }
        }

        let status = if cancel.is_cancelled() {
            ScanStatus::Cancelled
        } else {
            ScanStatus::Completed
        };
        Ok(self
            .aggregator
            .aggregate(scans, &root.display().to_string(), status, warnings))
    }
}

async fn scan_file(
    provider: Arc<dyn Provider>,
    cache: Option<Arc<ResultCache>>,
    options: ScanOptions,
    target: Arc<ScanTarget>,
    cancel: CancelFlag,
) -> FileScan {
    let path_scope = target.path.display().to_string();
    let mut scan = FileScan {
        target: Arc::clone(&target),
        findings: Vec::new(),
        warnings: Vec::new(),
        from_cache: false,
    };

    let bytes = match tokio::fs::read(&target.path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            scan.warnings
                .push(ScanWarning::new(&path_scope, WarningKind::Io, err.to_string()));
            return scan;
        }
    };
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(_) => {
            scan.warnings.push(ScanWarning::new(
                &path_scope,
                WarningKind::Decode,
                "file is not valid UTF-8",
            ));
            return scan;
        }
    };

    let fingerprint = ResultCache::fingerprint(
        &target.path,
        content.as_bytes(),
        options.profile,
        &provider.id(),
    );
    if let Some(ref cache) = cache {
        if let Some(entry) = cache.get(&fingerprint, &provider.id()) {
            debug!(path = %path_scope, "serving from cache");
            scan.findings = entry.findings;
            scan.from_cache = true;
            return scan;
        }
    }

    let units = chunk_content(&target, &content, options.max_unit_bytes);
    let mut provider_failed = false;
    for unit in &units {
        if cancel.is_cancelled() {
            debug!(path = %path_scope, "cancelled mid-file");
            provider_failed = true;
            break;
        }
        analyze_unit(&*provider, unit, &options, &cancel, &mut scan, &mut provider_failed).await;
    }

    // Only clean runs are worth remembering; caching a partial analysis
    // would keep serving it after the transient problem is gone.
    if !provider_failed {
        if let Some(ref cache) = cache {
            let entry = CacheEntry {
                fingerprint,
                provider: provider.id(),
                created_at: chrono::Utc::now().to_rfc3339(),
                findings: scan.findings.clone(),
            };
            if let Err(err) = cache.put(&entry) {
                scan.warnings.push(ScanWarning::new(
                    &path_scope,
                    WarningKind::Cache,
                    err.to_string(),
                ));
            }
        }
    }
    scan
}

async fn analyze_unit(
    provider: &dyn Provider,
    unit: &CodeUnit,
    options: &ScanOptions,
    cancel: &CancelFlag,
    scan: &mut FileScan,
    provider_failed: &mut bool,
) {
    let request = ProviderRequest {
        prompt: build_prompt(unit, options.profile),
        language: unit.target.language,
        profile: options.profile,
    };
    match call_with_retry(
        provider,
        &request,
        options.request_timeout,
        &options.retry,
        cancel,
    )
    .await
    {
        Ok(response) => {
            let (findings, warnings) = parse_response(&response.text, unit).into_parts();
            scan.findings.extend(findings);
            scan.warnings.extend(warnings);
        }
        Err(err) => {
            warn!(scope = %unit.scope(), error = %err, "unit abandoned");
            scan.warnings
                .push(ScanWarning::new(unit.scope(), err.warning_kind(), err.to_string()));
            *provider_failed = true;
        }
    }
}
