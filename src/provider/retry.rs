//! Bounded retry with capped exponential backoff.
//!
//! The loop lives here, outside the clients: a provider reports what kind
//! of failure happened, this layer decides whether to try again.

use std::time::Duration;

use tracing::{debug, warn};

use super::{Provider, ProviderError, ProviderRequest, ProviderResponse};
use crate::pipeline::CancelFlag;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let factor = 2u32.saturating_pow(exp);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Calls the provider, retrying transient failures up to the policy's
/// attempt budget. Timeout and fatal errors abandon immediately; so does
/// cancellation, checked before every sleep.
pub async fn call_with_retry(
    provider: &dyn Provider,
    request: &ProviderRequest,
    timeout: Duration,
    policy: &RetryPolicy,
    cancel: &CancelFlag,
) -> Result<ProviderResponse, ProviderError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match provider.analyze(request, timeout).await {
            Ok(response) => {
                debug!(provider = %provider.id(), attempt, "provider call succeeded");
                return Ok(response);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                if cancel.is_cancelled() {
                    return Err(err);
                }
                let delay = policy.backoff_delay(attempt);
                warn!(
                    provider = %provider.id(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Language;
    use crate::prompts::PromptProfile;
    use crate::provider::{ScriptedOutcome, ScriptedProvider};

    fn request() -> ProviderRequest {
        ProviderRequest {
            prompt: "analyze this".to_string(),
            language: Language::Python,
            profile: PromptProfile::Standard,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(30), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let provider = ScriptedProvider::new().with_outcomes(
            "analyze",
            vec![
                ScriptedOutcome::Fail(ProviderError::Transient("busy".into())),
                ScriptedOutcome::Fail(ProviderError::Transient("busy".into())),
                ScriptedOutcome::Respond(r#"{"vulnerabilities": []}"#.to_string()),
            ],
        );
        let result = call_with_retry(
            &provider,
            &request(),
            Duration::from_secs(1),
            &fast_policy(3),
            &CancelFlag::new(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let provider = ScriptedProvider::new().with_outcomes(
            "analyze",
            vec![
                ScriptedOutcome::Fail(ProviderError::Transient("busy".into())),
                ScriptedOutcome::Fail(ProviderError::Transient("busy".into())),
                ScriptedOutcome::Fail(ProviderError::Transient("busy".into())),
            ],
        );
        let result = call_with_retry(
            &provider,
            &request(),
            Duration::from_secs(1),
            &fast_policy(2),
            &CancelFlag::new(),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::Transient(_))));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let provider = ScriptedProvider::new().with_outcomes(
            "analyze",
            vec![ScriptedOutcome::Fail(ProviderError::Fatal(
                "bad key".into(),
            ))],
        );
        let result = call_with_retry(
            &provider,
            &request(),
            Duration::from_secs(1),
            &fast_policy(3),
            &CancelFlag::new(),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::Fatal(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn timeouts_are_not_retried() {
        let provider = ScriptedProvider::new().with_outcomes(
            "analyze",
            vec![ScriptedOutcome::Fail(ProviderError::Timeout(30))],
        );
        let result = call_with_retry(
            &provider,
            &request(),
            Duration::from_secs(1),
            &fast_policy(3),
            &CancelFlag::new(),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_backoff() {
        let provider = ScriptedProvider::new().with_outcomes(
            "analyze",
            vec![
                ScriptedOutcome::Fail(ProviderError::Transient("busy".into())),
                ScriptedOutcome::Respond("{}".to_string()),
            ],
        );
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = call_with_retry(
            &provider,
            &request(),
            Duration::from_secs(1),
            &fast_policy(3),
            &cancel,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 1);
    }
}
