//! Groq's OpenAI-compatible chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    classify_status, classify_transport, Provider, ProviderError, ProviderRequest,
    ProviderResponse,
};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

const SYSTEM_PROMPT: &str =
    "You are a security expert analyzing source code. Respond with ONLY valid JSON.";

pub struct GroqProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GroqProvider {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        GroqProvider {
            client: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Provider for GroqProvider {
    async fn analyze(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": 0.1,
            "response_format": { "type": "json_object" },
        });

        debug!(model = %self.model, "sending groq request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport(e, timeout))?;
        let text = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Transient("groq response missing message content".to_string())
            })?;

        Ok(ProviderResponse {
            text: text.to_string(),
            model: self.model.clone(),
        })
    }

    fn id(&self) -> String {
        format!("groq/{}", self.model)
    }
}
