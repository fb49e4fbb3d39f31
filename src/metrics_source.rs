//! Metrics backend adapter.
//!
//! Issues a single tenant-scoped instant query against a Prometheus-
//! compatible HTTP API and normalises the result into `MetricSample`s.

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::config::MetricsSourceConfig;
use crate::http::HttpClient;
use crate::models::MetricSample;

/// Self-telemetry of the metrics backend itself — never attributed to a tenant.
const IGNORED_PREFIXES: &[&str] = &["prom_", "go_", "scrape_", "promhttp_"];

/// The metrics-retrieval seam `BatchWorker` depends on. Lets tests substitute
/// a fixed fixture instead of issuing real HTTP queries.
#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    async fn fetch_for_tenant(&self, user_id: &str) -> Vec<MetricSample>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    metric: std::collections::HashMap<String, String>,
    value: (Value, String),
}

pub struct MetricsSource {
    client: Arc<HttpClient>,
    config: MetricsSourceConfig,
}

impl MetricsSource {
    pub fn new(client: Arc<HttpClient>, config: MetricsSourceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl MetricsFetcher for MetricsSource {
    /// Fetch every series labelled with `user_id`, excluding the backend's
    /// own self-telemetry. Any transport or status-level failure is logged
    /// and yields an empty result — callers treat "no metrics" as "skip this
    /// window", never as a reason to panic.
    async fn fetch_for_tenant(&self, user_id: &str) -> Vec<MetricSample> {
        let query = format!(r#"{{user_id="{user_id}"}}"#);
        let url = format!("{}/api/v1/query", self.config.url);

        let request = match self
            .client
            .get(&url)
            .query("query", &query)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout_secs))
            .build(&self.client)
        {
            Ok(req) => req,
            Err(e) => {
                error!("[metrics_source] failed to build request for {user_id}: {e}");
                return Vec::new();
            }
        };

        let response = match self.client.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("[metrics_source] query to {} failed: {e}", self.config.url);
                return Vec::new();
            }
        };

        if !response.is_success() {
            error!("[metrics_source] backend returned HTTP {}", response.status());
            return Vec::new();
        }

        let body: QueryResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                error!("[metrics_source] failed to decode response: {e}");
                return Vec::new();
            }
        };

        if body.status != "success" {
            warn!(
                "[metrics_source] query failed: {}",
                body.error.unwrap_or_else(|| "unknown".to_string())
            );
            return Vec::new();
        }

        let results = body.data.map(|d| d.result).unwrap_or_default();
        results
            .into_iter()
            .filter_map(|r| normalize(r, user_id))
            .collect()
    }
}

fn normalize(result: QueryResult, user_id: &str) -> Option<MetricSample> {
    let name = result.metric.get("__name__").cloned().unwrap_or_default();
    if IGNORED_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return None;
    }

    let instance = result
        .metric
        .get("instance")
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    let raw_value = result.value.1;
    let value = raw_value
        .parse::<f64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw_value));

    Some(MetricSample {
        name,
        value,
        instance,
        user_id: user_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_self_telemetry_prefixes() {
        for name in ["prom_build_info", "go_gc_duration", "scrape_duration_seconds", "promhttp_requests"] {
            assert!(IGNORED_PREFIXES.iter().any(|p| name.starts_with(p)));
        }
        assert!(!IGNORED_PREFIXES.iter().any(|p| "cpu_usage".starts_with(p)));
    }

    #[test]
    fn normalize_parses_numeric_values() {
        let mut metric = std::collections::HashMap::new();
        metric.insert("__name__".to_string(), "cpu_usage".to_string());
        metric.insert("instance".to_string(), "10.0.0.1:9100".to_string());
        let result = QueryResult { metric, value: (Value::Null, "97.5".to_string()) };
        let sample = normalize(result, "u1").expect("sample should be produced");
        assert_eq!(sample.name, "cpu_usage");
        assert_eq!(sample.value, Value::from(97.5));
        assert_eq!(sample.instance, "10.0.0.1:9100");
    }

    #[test]
    fn normalize_keeps_non_numeric_value_as_string() {
        let mut metric = std::collections::HashMap::new();
        metric.insert("__name__".to_string(), "status".to_string());
        let result = QueryResult { metric, value: (Value::Null, "NaN".to_string()) };
        let sample = normalize(result, "u1").expect("sample should be produced");
        assert_eq!(sample.value, Value::String("NaN".to_string()));
        assert_eq!(sample.instance, "unknown");
    }

    #[test]
    fn normalize_drops_self_telemetry() {
        let mut metric = std::collections::HashMap::new();
        metric.insert("__name__".to_string(), "go_goroutines".to_string());
        let result = QueryResult { metric, value: (Value::Null, "5".to_string()) };
        assert!(normalize(result, "u1").is_none());
    }
}
