use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use code_sentinel::cache::ResultCache;
use code_sentinel::cli::{Cli, OutputFormat};
use code_sentinel::config::Config;
use code_sentinel::discovery::FileSelector;
use code_sentinel::pipeline::{CancelFlag, ScanOptions, ScanPipeline};
use code_sentinel::prompts::PromptProfile;
use code_sentinel::provider::{create_provider, ProviderKind, RetryPolicy};
use code_sentinel::reporter::{
    apply_min_severity, HtmlReporter, JsonReporter, Reporter, TerminalReporter,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(Some(&cli.path));

    let provider_kind = cli
        .provider
        .or_else(|| {
            config
                .provider
                .as_deref()
                .and_then(|s| ProviderKind::from_str(s, true).ok())
        })
        .unwrap_or(ProviderKind::Ollama);
    let model = cli
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| "codellama".to_string());
    let profile = cli
        .profile
        .or_else(|| {
            config
                .prompt
                .as_deref()
                .and_then(|s| PromptProfile::from_str(s, true).ok())
        })
        .unwrap_or_default();

    let provider = match create_provider(
        provider_kind,
        &model,
        cli.api_key.as_deref(),
        cli.base_url.as_deref().or(config.base_url.as_deref()),
    ) {
        Ok(provider) => provider,
        Err(err) => {
            error!(error = %err, "cannot construct provider");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut selector = FileSelector::new();
    if !config.extensions.is_empty() {
        selector = selector.with_extensions(&config.extensions);
    }
    if !config.ignore.is_empty() {
        selector = selector.with_ignore_patterns(&config.ignore);
    }

    let mut options = ScanOptions::default();
    if let Some(workers) = cli.workers.or(config.workers) {
        options.workers = workers.max(1);
    }
    if let Some(max_unit_bytes) = cli.max_unit_bytes.or(config.max_unit_bytes) {
        options.max_unit_bytes = max_unit_bytes;
    }
    if let Some(timeout_secs) = cli.timeout_secs.or(config.timeout_secs) {
        options.request_timeout = std::time::Duration::from_secs(timeout_secs);
    }
    if let Some(max_retries) = cli.max_retries.or(config.max_retries) {
        options.retry = RetryPolicy {
            max_attempts: max_retries.max(1),
            ..RetryPolicy::default()
        };
    }
    options.profile = profile;

    let mut pipeline = ScanPipeline::new(provider)
        .with_selector(selector)
        .with_options(options);
    if !cli.no_cache {
        let cache_dir = cli
            .cache_dir
            .clone()
            .or(config.cache_dir.clone())
            .unwrap_or_else(|| ".code-sentinel-cache".into());
        match ResultCache::open(&cache_dir) {
            Ok(cache) => pipeline = pipeline.with_cache(cache),
            // A broken cache never blocks a scan.
            Err(err) => warn!(error = %err, "continuing without cache"),
        }
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let result = match pipeline.run(&cli.path, &cancel).await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "scan failed");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = match cli.min_severity {
        Some(min) => apply_min_severity(&result, min),
        None => result,
    };

    let reporter: Box<dyn Reporter> = match cli.format {
        OutputFormat::Terminal => Box::new(TerminalReporter::new(cli.verbose)),
        OutputFormat::Json => Box::new(JsonReporter::new()),
        OutputFormat::Html => Box::new(HtmlReporter::new()),
    };
    let report = reporter.report(&rendered);

    if let Some(ref output_path) = cli.output {
        if let Err(err) = std::fs::write(output_path, &report) {
            error!(path = %output_path.display(), error = %err, "cannot write report");
            eprintln!("error: cannot write {}: {err}", output_path.display());
            return ExitCode::FAILURE;
        }
        info!(path = %output_path.display(), "report written");
    } else {
        print!("{report}");
    }

    // Critical or high findings (after threshold filtering) fail the run.
    if rendered.summary.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
