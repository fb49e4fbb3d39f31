//! Domain entities shared across the metrics source, LLM gateway, persistence,
//! and notifier layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A scrape target a tenant has registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub user_id: String,
    pub name: String,
    pub endpoint: String,
    pub labels: Vec<String>,
    pub enabled: bool,
}

/// A single time-series observation pulled from the metrics backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: Value,
    pub instance: String,
    pub user_id: String,
}

/// The append-only snapshot of everything fetched for one tenant/window tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsBatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub window_start_str: String,
    pub window_end_str: String,
    pub collected_at: DateTime<Utc>,
    pub metrics: Vec<MetricSample>,
    pub metrics_count: usize,
    pub primary_instance: String,
    pub ip: String,
    pub port: Option<u16>,
    pub source: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub metric: String,
    pub instance: String,
    pub value: f64,
    pub why_it_matters: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FixPlan {
    pub immediate: Vec<String>,
    pub next_24h: Vec<String>,
    pub prevention: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub theme: String,
    pub anomaly_indexes: Vec<usize>,
}

/// One incident per successfully analysed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub batch_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub window_start_str: String,
    pub window_end_str: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub severity: Severity,
    pub confidence: f64,
    pub summary: String,
    pub root_cause: String,
    pub contributing_factors: Vec<String>,
    pub blast_radius: String,
    pub evidence: Vec<Evidence>,
    pub fix_plan: FixPlan,
    pub clusters: Vec<Cluster>,
    pub raw_analysis: Value,
    pub primary_instance: String,
    pub ip: String,
    pub port: Option<u16>,
    pub session_id: String,
}

/// One per detected anomaly within an analysed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub batch_id: String,
    pub incident_id: String,
    pub metric: String,
    pub instance: String,
    pub ip: String,
    pub port: Option<u16>,
    pub observed: f64,
    pub expected: String,
    pub symptom: String,
    pub cluster: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub window_start_str: String,
    pub window_end_str: String,
    pub session_id: String,
}

/// Denormalised read-path convenience copy of an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcaRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub batch_id: String,
    pub incident_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub cause: String,
    pub fix: Vec<String>,
    pub raw: Value,
    pub instance: String,
    pub ip: String,
    pub port: Option<u16>,
}

/// Idempotency guard: existence means the window has already been processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowLedgerEntry {
    pub user_id: String,
    pub window_start_str: String,
    pub window_end_str: String,
    pub processed_at: DateTime<Utc>,
    pub session_id: String,
    pub incident_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Chat,
    Email,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub user_id: String,
    pub channel: NotificationChannel,
    pub enabled: bool,
    pub destination: String,
}

/// Conversational-session bookkeeping for the out-of-scope chat assistant
/// endpoint; its janitor is hosted by this process (see `retention.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub message_count: u64,
    pub total_tokens: u64,
}

/// The schema the LLM is instructed to return (`parser::parse_analysis`'s output
/// is coerced into this, with defaults substituted for missing fields).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisIncident {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub contributing_factors: Vec<String>,
    #[serde(default)]
    pub blast_radius: String,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub fix_plan: FixPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisAnomaly {
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub observed: f64,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub symptom: String,
    #[serde(default)]
    pub cluster: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub incident: AnalysisIncident,
    #[serde(default)]
    pub anomalies: Vec<AnalysisAnomaly>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_round_trips_through_str() {
        for s in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
            assert_eq!(Severity::from_str_lossy(s.as_str()), s);
        }
        assert_eq!(Severity::from_str_lossy("unknown-garbage"), Severity::Low);
    }

    #[test]
    fn analysis_response_defaults_missing_fields() {
        let value: AnalysisResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(value.incident.severity, "");
        assert_eq!(value.incident.confidence, 0.0);
        assert!(value.anomalies.is_empty());
    }
}
