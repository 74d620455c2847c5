//! Hugging Face inference API.
//!
//! Cold models answer 503 while they load; that is transient and worth
//! waiting out, which is why it gets its own classification branch.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    classify_status, classify_transport, Provider, ProviderError, ProviderRequest,
    ProviderResponse,
};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";

pub struct HuggingFaceProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HuggingFaceProvider {
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<&str>) -> Self {
        HuggingFaceProvider {
            client: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
    async fn analyze(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/{}", self.base_url, self.model);
        let body = json!({
            "inputs": request.prompt,
            "parameters": {
                "temperature": 0.1,
                "max_new_tokens": 2000,
                "return_full_text": false,
            },
        });

        debug!(model = %self.model, "sending huggingface request");
        let mut builder = self.client.post(&url).timeout(timeout).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = response.status();
        if status.as_u16() == 503 {
            return Err(ProviderError::Transient(format!(
                "model {} is loading",
                self.model
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport(e, timeout))?;
        let text = payload
            .pointer("/0/generated_text")
            .and_then(Value::as_str)
            .or_else(|| payload.get("generated_text").and_then(Value::as_str))
            .ok_or_else(|| {
                ProviderError::Transient("huggingface response missing generated_text".to_string())
            })?;

        Ok(ProviderResponse {
            text: text.to_string(),
            model: self.model.clone(),
        })
    }

    fn id(&self) -> String {
        format!("huggingface/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_includes_model() {
        let provider = HuggingFaceProvider::new("bigcode/starcoder", None, None);
        assert_eq!(provider.id(), "huggingface/bigcode/starcoder");
    }
}
