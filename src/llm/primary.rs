//! Primary LLM provider: a hosted chat-completion API, bearer-authenticated.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::config::LlmConfig;
use crate::errors::LlmError;
use crate::http::{Authentication, HttpClient};

use super::tracing::{Span, TraceClient};

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

pub struct PrimaryProvider {
    client: Arc<HttpClient>,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    temperature: f32,
}

impl PrimaryProvider {
    pub fn new(client: Arc<HttpClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: config.primary_api_key.clone(),
            model: config.primary_model.clone(),
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
        if self.api_key.is_empty() {
            return Err(LlmError::Transient {
                provider: "primary",
                reason: "no API key configured".to_string(),
            });
        }

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });

        let request = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .map_err(|e| LlmError::Transient { provider: "primary", reason: e.to_string() })?
            .auth(Authentication::Bearer(self.api_key.clone()))
            .timeout(self.timeout)
            .build(&self.client)
            .map_err(|e| LlmError::Transient { provider: "primary", reason: e.to_string() })?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| LlmError::Transient { provider: "primary", reason: e.to_string() })?;

        if !response.is_success() {
            return Err(LlmError::Transient {
                provider: "primary",
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transient { provider: "primary", reason: e.to_string() })?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::Empty { provider: "primary" });
        }

        let tokens = match parsed.usage {
            Some(u) => u.prompt_tokens + u.completion_tokens,
            None => super::estimate_tokens(prompt, &text),
        };

        Ok((text, tokens))
    }
}
