use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::findings::Severity;
use crate::prompts::PromptProfile;
use crate::provider::ProviderKind;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
    Html,
}

#[derive(Parser, Debug)]
#[command(
    name = "code-sentinel",
    version,
    about = "AI-powered source code security scanner",
    long_about = "code-sentinel sends source files to an AI model backend and reports \
                  the security vulnerabilities it identifies, with caching so unchanged \
                  files are never re-analyzed."
)]
pub struct Cli {
    /// Path to scan (a file or a directory)
    pub path: PathBuf,

    /// AI backend to use (default ollama)
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model name for the chosen backend (default codellama)
    #[arg(short, long)]
    pub model: Option<String>,

    /// API key (falls back to GROQ_API_KEY / HF_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Override the backend base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Analysis prompt profile (default standard)
    #[arg(long = "prompt", value_enum)]
    pub profile: Option<PromptProfile>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Hide findings below this severity
    #[arg(long, value_enum)]
    pub min_severity: Option<Severity>,

    /// Concurrent files analyzed (defaults to CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Disable the result cache
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory (default: .code-sentinel-cache)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Per-request timeout in seconds (default 60)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Attempts per code unit, including the first (default 3)
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Chunking budget per request, in bytes
    #[arg(long)]
    pub max_unit_bytes: Option<usize>,

    /// Verbose report output
    #[arg(short, long)]
    pub verbose: bool,
}
