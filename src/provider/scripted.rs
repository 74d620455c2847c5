//! A provider with scripted outcomes, for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Provider, ProviderError, ProviderRequest, ProviderResponse};

/// What one scripted call should do.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Respond(String),
    Fail(ProviderError),
}

struct Rule {
    /// Substring matched against the incoming prompt.
    pattern: String,
    outcomes: VecDeque<ScriptedOutcome>,
}

/// Routes each request to the first rule whose pattern appears in the
/// prompt, popping that rule's outcome queue. Requests with no matching
/// rule, and rules with an exhausted queue, get the default response.
/// Every call is counted, whatever the outcome.
pub struct ScriptedProvider {
    rules: Mutex<Vec<Rule>>,
    default_response: String,
    model: String,
    calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        ScriptedProvider {
            rules: Mutex::new(Vec::new()),
            default_response: r#"{"vulnerabilities": []}"#.to_string(),
            model: "scripted".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Queues outcomes for prompts containing `pattern`, consumed in order.
    pub fn with_outcomes(self, pattern: impl Into<String>, outcomes: Vec<ScriptedOutcome>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.into(),
            outcomes: outcomes.into(),
        });
        self
    }

    /// Total number of `analyze` calls observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn analyze(
        &self,
        request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .find(|r| request.prompt.contains(&r.pattern))
                .and_then(|r| r.outcomes.pop_front())
        };
        match outcome {
            Some(ScriptedOutcome::Fail(err)) => Err(err),
            Some(ScriptedOutcome::Respond(text)) => Ok(ProviderResponse {
                text,
                model: self.model.clone(),
            }),
            None => Ok(ProviderResponse {
                text: self.default_response.clone(),
                model: self.model.clone(),
            }),
        }
    }

    fn id(&self) -> String {
        format!("scripted/{}", self.model)
    }
}
