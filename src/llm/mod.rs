//! LLM gateway: primary provider with a secondary fallback, optional tracing,
//! uniform token accounting.

mod primary;
mod secondary;
pub mod tracing;

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde_json::json;

use crate::config::LlmConfig;
use crate::errors::LlmError;
use crate::http::HttpClient;
use tracing::TraceClient;

pub use primary::PrimaryProvider;
pub use secondary::SecondaryProvider;

/// The analysis seam `BatchWorker` depends on. Lets tests substitute a fixed
/// response instead of calling out to a real provider.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn ask(
        &self,
        prompt: &str,
        trace_name: &str,
        metadata: serde_json::Value,
        session_id: &str,
    ) -> Option<(String, u64)>;
}

/// `ceil(1.3 * word_count(prompt + "\n" + response))`, the estimator used
/// whenever a provider doesn't report its own token usage.
pub fn estimate_tokens(prompt: &str, response: &str) -> u64 {
    let combined = format!("{prompt}\n{response}");
    let words = combined.split_whitespace().count();
    ((words as f64) * 1.3).ceil() as u64
}

pub struct LlmGateway {
    primary: PrimaryProvider,
    secondary: SecondaryProvider,
    tracer: Arc<TraceClient>,
}

impl LlmGateway {
    pub fn new(client: Arc<HttpClient>, config: LlmConfig, tracer: Arc<TraceClient>) -> Self {
        Self {
            primary: PrimaryProvider::new(client.clone(), &config),
            secondary: SecondaryProvider::new(client, &config),
            tracer,
        }
    }
}

#[async_trait]
impl Analyzer for LlmGateway {
    /// Try the primary provider, then the secondary on any failure. Returns
    /// `None` when both are exhausted.
    async fn ask(
        &self,
        prompt: &str,
        trace_name: &str,
        metadata: serde_json::Value,
        session_id: &str,
    ) -> Option<(String, u64)> {
        let root_metadata = json!({
            "session_id": session_id,
            "extra": metadata,
        });
        let span = self.tracer.start_span(trace_name, root_metadata);

        match self.primary.call(prompt, &self.tracer, &span).await {
            Ok((text, tokens)) => {
                self.tracer.end(
                    span,
                    tracing::TraceEvent {
                        span_name: "llm-generation".to_string(),
                        output: json!({ "provider": "primary", "tokens": tokens }),
                    },
                );
                info!("[llm] primary provider succeeded ({tokens} tokens)");
                return Some((text, tokens));
            }
            Err(e) => {
                self.tracer.end(
                    span,
                    tracing::TraceEvent {
                        span_name: "llm-generation".to_string(),
                        output: json!({ "provider": "primary", "error": e.to_string() }),
                    },
                );
                warn!("[llm] primary provider failed: {e}. Falling back to secondary.");
            }
        }

        // The span above was already consumed by `end`'s ownership; open a
        // fresh one for the fallback attempt so each provider's outcome is
        // recorded independently.
        let fallback_span = self.tracer.start_span(trace_name, json!({ "session_id": session_id }));

        match self.secondary.call(prompt, &self.tracer, &fallback_span).await {
            Ok((text, tokens)) => {
                self.tracer.end(
                    fallback_span,
                    tracing::TraceEvent {
                        span_name: "llm-generation".to_string(),
                        output: json!({ "provider": "secondary", "tokens": tokens }),
                    },
                );
                info!("[llm] secondary provider succeeded ({tokens} tokens)");
                Some((text, tokens))
            }
            Err(e) => {
                self.tracer.end(
                    fallback_span,
                    tracing::TraceEvent {
                        span_name: "llm-generation".to_string(),
                        output: json!({ "provider": "secondary", "error": e.to_string() }),
                    },
                );
                warn!("[llm] secondary provider also failed: {e}");
                None
            }
        }
    }
}
