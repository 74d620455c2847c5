pub mod aggregator;
pub mod cache;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod findings;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod reporter;

pub use cli::{Cli, OutputFormat};
pub use config::Config;
pub use error::{Result, ScanError, ScanWarning, WarningKind};
pub use findings::{Finding, ScanResult, ScanStatus, Severity, Summary};
pub use pipeline::{CancelFlag, ScanOptions, ScanPipeline};
pub use provider::{Provider, ProviderError, ProviderKind};
pub use reporter::{HtmlReporter, JsonReporter, Reporter, TerminalReporter};
