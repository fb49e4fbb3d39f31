//! Secondary LLM provider: a self-hosted generate API (Ollama/LM Studio
//! style), used only when the primary provider fails.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::config::LlmConfig;
use crate::errors::LlmError;
use crate::http::HttpClient;

use super::tracing::{Span, TraceClient};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

pub struct SecondaryProvider {
    client: Arc<HttpClient>,
    endpoint: String,
    model: String,
    timeout: Duration,
    temperature: f32,
}

impl SecondaryProvider {
    pub fn new(client: Arc<HttpClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            endpoint: config.secondary_url.clone(),
            model: config.secondary_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            temperature: config.temperature,
        }
    }

    pub async fn call(
        &self,
        prompt: &str,
        _tracer: &TraceClient,
        _span: &Span,
    ) -> Result<(String, u64), LlmError> {
        if self.endpoint.is_empty() {
            return Err(LlmError::Transient {
                provider: "secondary",
                reason: "no endpoint configured".to_string(),
            });
        }

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));

        let request = self
            .client
            .post(&url)
            .json(&body)
            .map_err(|e| LlmError::Transient { provider: "secondary", reason: e.to_string() })?
            .timeout(self.timeout)
            .build(&self.client)
            .map_err(|e| LlmError::Transient { provider: "secondary", reason: e.to_string() })?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| LlmError::Transient { provider: "secondary", reason: e.to_string() })?;

        if !response.is_success() {
            return Err(LlmError::Transient {
                provider: "secondary",
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transient { provider: "secondary", reason: e.to_string() })?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(LlmError::Empty { provider: "secondary" });
        }

        let tokens = if parsed.prompt_eval_count > 0 || parsed.eval_count > 0 {
            parsed.prompt_eval_count + parsed.eval_count
        } else {
            super::estimate_tokens(prompt, &text)
        };

        Ok((text, tokens))
    }
}
