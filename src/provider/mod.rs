//! AI provider clients.
//!
//! Every backend implements [`Provider`]: one prompt in, raw model text out.
//! Providers classify their own failures as timeout, transient or fatal;
//! deciding whether to retry belongs to [`retry`], not to the client.
//! Text that arrives but does not parse is not a provider error at all,
//! that is the response parser's concern.

pub mod groq;
pub mod huggingface;
pub mod ollama;
pub mod retry;
pub mod scripted;

pub use groq::GroqProvider;
pub use huggingface::HuggingFaceProvider;
pub use ollama::OllamaProvider;
pub use retry::RetryPolicy;
pub use scripted::{ScriptedOutcome, ScriptedProvider};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discovery::Language;
use crate::error::{ScanError, WarningKind};
use crate::prompts::PromptProfile;

/// Which backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Groq,
    Huggingface,
}

/// Failure classification for a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    pub fn warning_kind(&self) -> WarningKind {
        match self {
            ProviderError::Timeout(_) => WarningKind::ProviderTimeout,
            ProviderError::Transient(_) => WarningKind::ProviderTransient,
            ProviderError::Fatal(_) => WarningKind::ProviderFatal,
        }
    }
}

/// One analysis request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub prompt: String,
    pub language: Language,
    pub profile: PromptProfile,
}

/// Raw model output, unparsed.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub model: String,
}

/// A backend that can analyze one code unit.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Sends one request and returns the raw response text.
    ///
    /// Implementations must enforce `timeout` and map it to
    /// [`ProviderError::Timeout`].
    async fn analyze(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Stable identifier, `backend/model`. Part of the cache key.
    fn id(&self) -> String;
}

/// Builds a provider, failing fast on missing credentials.
pub fn create_provider(
    kind: ProviderKind,
    model: &str,
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> crate::error::Result<Arc<dyn Provider>> {
    match kind {
        ProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(model, base_url))),
        ProviderKind::Groq => {
            let key = api_key
                .map(|k| k.to_string())
                .or_else(|| std::env::var("GROQ_API_KEY").ok())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    ScanError::Config(
                        "groq requires an API key (--api-key or GROQ_API_KEY)".to_string(),
                    )
                })?;
            Ok(Arc::new(GroqProvider::new(model, key, base_url)))
        }
        ProviderKind::Huggingface => {
            let key = api_key
                .map(|k| k.to_string())
                .or_else(|| std::env::var("HF_API_KEY").ok());
            Ok(Arc::new(HuggingFaceProvider::new(model, key, base_url)))
        }
    }
}

/// Maps an HTTP error status to a provider error. Rate limiting and server
/// errors are worth retrying; other client errors are not.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    if status.as_u16() == 429 || status.is_server_error() {
        ProviderError::Transient(detail)
    } else {
        ProviderError::Fatal(detail)
    }
}

/// Maps a reqwest transport error. Connection problems are transient;
/// request construction problems are not.
pub(crate) fn classify_transport(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout.as_secs())
    } else if err.is_builder() {
        ProviderError::Fatal(err.to_string())
    } else {
        ProviderError::Transient(err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(ProviderError::Transient("503".into()).is_retryable());
        assert!(!ProviderError::Timeout(30).is_retryable());
        assert!(!ProviderError::Fatal("401".into()).is_retryable());
    }

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        use reqwest::StatusCode;
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            ProviderError::Fatal(_)
        ));
    }

    #[test]
    fn groq_without_key_fails_fast() {
        std::env::remove_var("GROQ_API_KEY");
        let result = create_provider(ProviderKind::Groq, "llama3-70b-8192", None, None);
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn ollama_needs_no_credentials() {
        let provider = create_provider(ProviderKind::Ollama, "codellama", None, None).unwrap();
        assert_eq!(provider.id(), "ollama/codellama");
    }
}
