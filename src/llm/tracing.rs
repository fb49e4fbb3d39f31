//! A minimal trace client for the LLM gateway, modelled on Langfuse's batch
//! ingestion API: spans accumulate in memory and `flush` ships them as one
//! authenticated POST. When no sink is configured, every call is a no-op and
//! the gateway behaves identically to the untraced path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde_json::{json, Value};

use crate::config::TracingConfig;
use crate::http::{Authentication, HttpClient};

/// A single open span. Dropping it without calling `end` still releases
/// resources, but `end` is what records the observation.
pub struct Span {
    pub name: String,
    pub metadata: Value,
    id: u64,
}

pub struct Generation {
    pub model: String,
    pub input: String,
}

#[derive(Debug, Default)]
pub struct TraceEvent {
    pub span_name: String,
    pub output: Value,
}

/// Process-wide optional trace sink. Constructed once and shared via the
/// services bundle; `enabled()` lets callers skip building spans entirely
/// when tracing is off. Ended spans are buffered and shipped to the
/// configured ingestion endpoint on `flush`, matching the batch-on-shutdown
/// behaviour of the Langfuse client this module stands in for.
pub struct TraceClient {
    enabled: bool,
    next_id: AtomicU64,
    http: Option<Arc<HttpClient>>,
    ingestion_url: String,
    public_key: String,
    secret_key: String,
    buffer: Mutex<Vec<Value>>,
}

impl TraceClient {
    pub fn new(config: &TracingConfig, http: Arc<HttpClient>) -> Self {
        Self {
            enabled: config.enabled,
            next_id: AtomicU64::new(1),
            http: Some(http),
            ingestion_url: format!("{}/api/public/ingestion", config.host.trim_end_matches('/')),
            public_key: config.public_key.clone(),
            secret_key: config.secret_key.clone(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// A client with no sink at all; `enabled()` is always false. Used when
    /// a caller needs a `TraceClient` outside the normal config-driven path.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            next_id: AtomicU64::new(1),
            http: None,
            ingestion_url: String::new(),
            public_key: String::new(),
            secret_key: String::new(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Start a root span with the given name and metadata.
    pub fn start_span(&self, name: &str, metadata: Value) -> Span {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Span { name: name.to_string(), metadata, id }
    }

    /// Start a nested generation span under `parent`.
    pub fn start_generation(&self, _parent: &Span, model: &str, input: &str) -> Generation {
        Generation { model: model.to_string(), input: input.to_string() }
    }

    /// Record the outcome of a generation and close the root span, buffering
    /// it for the next `flush`.
    pub fn end(&self, span: Span, outcome: TraceEvent) {
        if !self.enabled {
            return;
        }
        let event = json!({
            "span_id": span.id,
            "span_name": span.name,
            "metadata": span.metadata,
            "outcome": { "span_name": outcome.span_name, "output": outcome.output },
        });
        self.buffer.lock().unwrap().push(event);
    }

    /// Ship every buffered span as one ingestion batch. No-op when tracing
    /// is disabled or nothing has been buffered since the last flush.
    pub async fn flush(&self) {
        if !self.enabled {
            return;
        }
        let Some(http) = &self.http else {
            return;
        };

        let events = {
            let mut buffer = self.buffer.lock().unwrap();
            std::mem::take(&mut *buffer)
        };
        if events.is_empty() {
            return;
        }
        let count = events.len();
        let body = json!({ "batch": events });

        let request = match http
            .post(&self.ingestion_url)
            .auth(Authentication::Basic(self.public_key.clone(), self.secret_key.clone()))
            .json(&body)
            .and_then(|b| b.build(http))
        {
            Ok(req) => req,
            Err(e) => {
                warn!("[tracer] failed to build ingestion request: {e}");
                return;
            }
        };

        match http.execute(request).await {
            Ok(resp) if resp.is_success() => info!("[tracer] flushed {count} spans"),
            Ok(resp) => warn!("[tracer] ingestion endpoint returned HTTP {}", resp.status()),
            Err(e) => warn!("[tracer] flush failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClientConfig;

    fn http_client() -> Arc<HttpClient> {
        Arc::new(HttpClient::new(HttpClientConfig::default()).expect("client should build"))
    }

    fn tracing_config(enabled: bool) -> TracingConfig {
        TracingConfig {
            enabled,
            public_key: "pk".to_string(),
            secret_key: "sk".to_string(),
            host: "https://example.invalid".to_string(),
        }
    }

    #[test]
    fn disabled_client_is_a_no_op() {
        let client = TraceClient::disabled();
        assert!(!client.enabled());
        let span = client.start_span("test", json!({}));
        client.end(span, TraceEvent { span_name: "test".to_string(), output: json!({}) });
        assert!(client.buffer.lock().unwrap().is_empty());
    }

    #[test]
    fn enabled_client_assigns_increasing_span_ids() {
        let client = TraceClient::new(&tracing_config(true), http_client());
        let a = client.start_span("a", json!({}));
        let b = client.start_span("b", json!({}));
        assert!(b.id > a.id);
    }

    #[test]
    fn ending_a_span_buffers_it_only_when_enabled() {
        let enabled = TraceClient::new(&tracing_config(true), http_client());
        let span = enabled.start_span("batch", json!({"window": "09:00"}));
        enabled.end(span, TraceEvent { span_name: "batch".to_string(), output: json!({"outcome": "done"}) });
        assert_eq!(enabled.buffer.lock().unwrap().len(), 1);

        let disabled = TraceClient::new(&tracing_config(false), http_client());
        let span = disabled.start_span("batch", json!({}));
        disabled.end(span, TraceEvent { span_name: "batch".to_string(), output: json!({}) });
        assert!(disabled.buffer.lock().unwrap().is_empty());
    }
}
