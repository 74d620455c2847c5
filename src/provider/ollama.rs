//! Local inference via Ollama's generate API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    classify_status, classify_transport, Provider, ProviderError, ProviderRequest,
    ProviderResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, base_url: Option<&str>) -> Self {
        OllamaProvider {
            client: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn analyze(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": 0.1,
                "top_p": 0.9,
            },
        });

        debug!(model = %self.model, url = %url, "sending ollama request");
        let response = self
            .client
            .post(&url)
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
            .get("response")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Transient("ollama response missing 'response' field".to_string())
            })?;

        Ok(ProviderResponse {
            text: text.to_string(),
            model: self.model.clone(),
        })
    }

    fn id(&self) -> String {
        format!("ollama/{}", self.model)
    }
}
