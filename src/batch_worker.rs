//! Per-tenant batch state machine: align to the window boundary, skip if
//! already processed, fetch metrics, ask the LLM for a collective RCA,
//! attribute the primary instance, persist, alert, and mark the window
//! done — then sleep until the next aligned bucket.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use log::{error, info, warn};
use serde_json::json;

use crate::attribution::{parse_instance, pick_primary};
use crate::models::{
    Anomaly, AnalysisResponse, Incident, MetricSample, MetricsBatch, RcaRecord, Severity,
    WindowLedgerEntry,
};
use crate::parser::parse_analysis;
use crate::services::Services;
use crate::time::{self, CivilZone};

/// The terminal state of one `run_once` tick, used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The window's ledger entry already existed.
    Skip,
    /// The metrics backend returned nothing for this tenant/window.
    Empty,
    /// Both LLM providers failed.
    Fail,
    Done,
}

pub struct BatchWorker {
    user_id: String,
    services: Arc<Services>,
    zone: CivilZone,
    cancelled: Arc<AtomicBool>,
}

impl BatchWorker {
    pub fn new(user_id: String, services: Arc<Services>) -> Self {
        Self { user_id, services, zone: CivilZone::ist(), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Sleeps to the next aligned bucket boundary, runs a tick, and repeats
    /// until cancelled. A failed tick backs off for 60s before retrying,
    /// matching the source's retry-after-error behaviour.
    pub async fn run_loop(self) {
        let interval = self.services.config.batch.interval_minutes;
        info!("[batch:{}] worker started (every {interval}m)", self.user_id);

        while !self.cancelled.load(Ordering::Relaxed) {
            let now = Utc::now();
            let next = time::next_bucket_start(now, interval);
            let sleep_for = (next - now).to_std().unwrap_or(StdDuration::ZERO);
            if sleep_for > StdDuration::ZERO {
                tokio::time::sleep(sleep_for).await;
            }
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }

            match self.run_once().await {
                Ok(outcome) => info!("[batch:{}] tick complete: {outcome:?}", self.user_id),
                Err(e) => {
                    error!("[batch:{}] tick failed: {e}", self.user_id);
                    tokio::time::sleep(StdDuration::from_secs(60)).await;
                }
            }
        }

        info!("[batch:{}] worker stopped", self.user_id);
    }

    pub async fn run_once(&self) -> anyhow::Result<Outcome> {
        let batch = self.services.config.batch.clone();
        let (window_start, window_end) = time::window(Utc::now(), batch.interval_minutes);
        let window_start_str = self.zone.format_civil(window_start, true);
        let window_end_str = self.zone.format_civil(window_end, true);
        let session_id = time::session_id((window_start, window_end), "batch", &self.user_id);

        info!(
            "[batch:{}] running {window_start_str} -> {window_end_str} | session={session_id}",
            self.user_id
        );

        if self
            .services
            .store
            .is_processed(&self.user_id, &window_start_str, &window_end_str)
            .await?
        {
            info!("[batch:{}] already processed, skipping", self.user_id);
            return Ok(Outcome::Skip);
        }

        let span_metadata = json!({
            "window_start": window_start.to_rfc3339(),
            "window_end": window_end.to_rfc3339(),
            "timezone": self.zone.label,
        });
        let span = self.services.tracer.start_span("Batch Monitoring", span_metadata);

        let metrics = self.services.metrics_source.fetch_for_tenant(&self.user_id).await;
        if metrics.is_empty() {
            warn!("[batch:{}] no metrics, skipping", self.user_id);
            self.services.tracer.end(
                span,
                crate::llm::tracing::TraceEvent { span_name: "batch".to_string(), output: json!({"outcome": "empty"}) },
            );
            return Ok(Outcome::Empty);
        }
        info!("[batch:{}] fetched {} metrics", self.user_id, metrics.len());

        let prompt = build_prompt(&metrics, &batch, &window_start_str, &window_end_str);
        let metadata = json!({
            "window_start": window_start.to_rfc3339(),
            "window_end": window_end.to_rfc3339(),
            "metrics_count": metrics.len(),
            "timezone": self.zone.label,
        });

        let llm_result = self.services.llm.ask(&prompt, "Batch Collective RCA", metadata, &session_id).await;
        let Some((text, _tokens)) = llm_result else {
            error!("[batch:{}] LLM analysis failed", self.user_id);
            self.services.tracer.end(
                span,
                crate::llm::tracing::TraceEvent { span_name: "batch".to_string(), output: json!({"outcome": "llm_failed"}) },
            );
            return Ok(Outcome::Fail);
        };

        let analysis: AnalysisResponse = serde_json::from_value(parse_analysis(&text)).unwrap_or_default();

        let batch_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let anomalies: Vec<Anomaly> = analysis
            .anomalies
            .iter()
            .map(|a| Anomaly {
                id: None,
                user_id: self.user_id.clone(),
                batch_id: batch_id.clone(),
                incident_id: String::new(), // filled in after the incident id is known
                metric: a.metric.clone(),
                instance: a.instance.clone(),
                ip: String::new(),
                port: None,
                observed: a.observed,
                expected: a.expected.clone(),
                symptom: a.symptom.clone(),
                cluster: a.cluster.clone(),
                severity: Severity::from_str_lossy(&analysis.incident.severity),
                created_at: now,
                window_start_str: window_start_str.clone(),
                window_end_str: window_end_str.clone(),
                session_id: session_id.clone(),
            })
            .collect();

        let mut incident = Incident {
            id: None,
            user_id: self.user_id.clone(),
            batch_id: batch_id.clone(),
            window_start,
            window_end,
            window_start_str: window_start_str.clone(),
            window_end_str: window_end_str.clone(),
            created_at: now,
            title: if analysis.incident.title.is_empty() { "Batch Analysis".to_string() } else { analysis.incident.title.clone() },
            severity: Severity::from_str_lossy(&analysis.incident.severity),
            confidence: analysis.incident.confidence,
            summary: analysis.incident.summary.clone(),
            root_cause: analysis.incident.root_cause.clone(),
            contributing_factors: analysis.incident.contributing_factors.clone(),
            blast_radius: analysis.incident.blast_radius.clone(),
            evidence: analysis.incident.evidence.clone(),
            fix_plan: analysis.incident.fix_plan.clone(),
            clusters: analysis.clusters.clone(),
            raw_analysis: serde_json::to_value(&analysis).unwrap_or_default(),
            primary_instance: "unknown".to_string(),
            ip: String::new(),
            port: None,
            session_id: session_id.clone(),
        };

        let primary_instance = pick_primary(&metrics, &incident, &anomalies);
        let (ip, port) = parse_instance(&primary_instance);
        incident.primary_instance = primary_instance.clone();
        incident.ip = ip.clone();
        incident.port = port;

        let anomalies: Vec<Anomaly> = anomalies
            .into_iter()
            .map(|mut a| {
                a.incident_id = incident_placeholder_id(&batch_id);
                a
            })
            .collect();

        let metrics_batch = MetricsBatch {
            id: None,
            user_id: self.user_id.clone(),
            window_start,
            window_end,
            window_start_str: window_start_str.clone(),
            window_end_str: window_end_str.clone(),
            collected_at: now,
            metrics_count: metrics.len(),
            metrics,
            primary_instance: primary_instance.clone(),
            ip: ip.clone(),
            port,
            source: "prometheus".to_string(),
            session_id: session_id.clone(),
        };

        info!(
            "[batch:{}] result: {} | {} | {} anomalies",
            self.user_id,
            incident.title,
            incident.severity.as_str(),
            anomalies.len()
        );

        if let Err(e) = self.services.store.store_batch(&metrics_batch).await {
            error!("[batch:{}] failed to store metrics batch: {e}", self.user_id);
        }
        if let Err(e) = self.services.store.store_incident(&incident).await {
            error!("[batch:{}] failed to store incident: {e}", self.user_id);
        }
        if !anomalies.is_empty() {
            if let Err(e) = self.services.store.store_anomalies(&anomalies).await {
                error!("[batch:{}] failed to store anomalies: {e}", self.user_id);
            }
        }

        let rca = RcaRecord {
            id: None,
            user_id: self.user_id.clone(),
            batch_id: batch_id.clone(),
            incident_id: incident_placeholder_id(&batch_id),
            timestamp: now,
            summary: incident.summary.clone(),
            cause: incident.root_cause.clone(),
            fix: incident.fix_plan.immediate.clone(),
            raw: incident.raw_analysis.clone(),
            instance: primary_instance.clone(),
            ip,
            port,
        };
        if let Err(e) = self.services.store.store_rca(&rca).await {
            error!("[batch:{}] failed to store RCA record: {e}", self.user_id);
        }

        match self.services.store.list_enabled_notifications(&self.user_id).await {
            Ok(configs) => {
                self.services.notifier.notify(&configs, &incident, anomalies.len(), &session_id).await
            }
            Err(e) => warn!("[batch:{}] failed to load notification configs: {e}", self.user_id),
        }

        let ledger_entry = WindowLedgerEntry {
            user_id: self.user_id.clone(),
            window_start_str: window_start_str.clone(),
            window_end_str: window_end_str.clone(),
            processed_at: Utc::now(),
            session_id: session_id.clone(),
            incident_id: incident_placeholder_id(&batch_id),
        };
        self.services.store.mark_processed(&ledger_entry).await?;

        self.services.tracer.end(
            span,
            crate::llm::tracing::TraceEvent {
                span_name: "batch".to_string(),
                output: json!({ "outcome": "done", "incident_title": incident.title }),
            },
        );

        info!("[batch:{}] complete: {window_start_str} -> {window_end_str}", self.user_id);
        Ok(Outcome::Done)
    }
}

/// Placeholder correlation id used until the store assigns a real incident
/// id; anomalies and the RCA record reference the batch they came from.
fn incident_placeholder_id(batch_id: &str) -> String {
    format!("incident-for-{batch_id}")
}

fn build_prompt(
    metrics: &[MetricSample],
    batch: &crate::config::BatchConfig,
    window_start_str: &str,
    window_end_str: &str,
) -> String {
    let mut grouped: BTreeMap<&str, Vec<&MetricSample>> = BTreeMap::new();
    for m in metrics {
        grouped.entry(m.instance.as_str()).or_default().push(m);
    }

    let mut lines = String::new();
    let mut total = 0usize;
    'outer: for (instance, mut inst_metrics) in grouped {
        lines.push_str(&format!("\n### Instance: {instance}\n"));
        inst_metrics.sort_by(|a, b| a.name.cmp(&b.name));
        for m in inst_metrics.into_iter().take(batch.max_metrics_per_instance) {
            if total >= batch.max_metrics {
                lines.push_str(&format!("\n  ... (capped at {})\n", batch.max_metrics));
                break 'outer;
            }
            lines.push_str(&format!("  {}: {}\n", m.name, m.value));
            total += 1;
        }
    }

    let schema = json!({
        "incident": {
            "title": "string", "severity": "low|medium|high|critical",
            "confidence": 0.0, "summary": "string", "root_cause": "string",
            "contributing_factors": [], "blast_radius": "string",
            "evidence": [{"metric": "", "instance": "", "value": 0, "why_it_matters": ""}],
            "fix_plan": {"immediate": [], "next_24h": [], "prevention": []}
        },
        "anomalies": [{"metric": "", "instance": "", "observed": 0, "expected": "", "symptom": "", "cluster": ""}],
        "clusters": [{"name": "", "theme": "", "anomaly_indexes": []}]
    });
    let schema_str = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        "You are an expert SRE analyzing Prometheus metrics.\n\n\
         BATCH WINDOW: {window_start_str} -> {window_end_str} ({} min)\n\n\
         TASKS:\n\
         1. Detect anomalies (spikes, drops, errors, high resource usage)\n\
         2. Cluster related anomalies by root cause\n\
         3. Provide collective RCA with evidence\n\
         4. Return ONLY valid JSON (no markdown)\n\n\
         METRICS ({total}/{} included):\n{lines}\n\n\
         SCHEMA:\n{schema_str}\n\n\
         RETURN ONLY JSON:",
        batch.interval_minutes,
        metrics.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::data_stores::memory::InMemoryObservabilityStore;
    use crate::llm::Analyzer;
    use crate::metrics_source::MetricsFetcher;
    use crate::services::test_support::test_services;
    use async_trait::async_trait;
    use serde_json::Value;

    fn batch_config() -> BatchConfig {
        BatchConfig { interval_minutes: 2, max_metrics: 600, max_metrics_per_instance: 200 }
    }

    struct FixedMetrics(Vec<MetricSample>);

    #[async_trait]
    impl MetricsFetcher for FixedMetrics {
        async fn fetch_for_tenant(&self, _user_id: &str) -> Vec<MetricSample> {
            self.0.clone()
        }
    }

    struct FixedAnalyzer(Option<(String, u64)>);

    #[async_trait]
    impl Analyzer for FixedAnalyzer {
        async fn ask(
            &self,
            _prompt: &str,
            _trace_name: &str,
            _metadata: serde_json::Value,
            _session_id: &str,
        ) -> Option<(String, u64)> {
            self.0.clone()
        }
    }

    fn sample_metric() -> MetricSample {
        MetricSample {
            name: "cpu_usage".to_string(),
            value: Value::from(97.5),
            instance: "10.0.0.5:9100".to_string(),
            user_id: "alice".to_string(),
        }
    }

    fn canned_analysis() -> String {
        serde_json::json!({
            "incident": {
                "title": "CPU saturation",
                "severity": "high",
                "confidence": 0.9,
                "summary": "CPU pinned at 100%",
                "root_cause": "runaway goroutine",
                "contributing_factors": [],
                "blast_radius": "single instance",
                "evidence": [],
                "fix_plan": {"immediate": [], "next_24h": [], "prevention": []}
            },
            "anomalies": [],
            "clusters": []
        })
        .to_string()
    }

    #[tokio::test]
    async fn run_once_persists_incident_and_marks_ledger_on_happy_path() {
        let store = Arc::new(InMemoryObservabilityStore::new());
        let metrics: Arc<dyn MetricsFetcher> = Arc::new(FixedMetrics(vec![sample_metric()]));
        let llm: Arc<dyn Analyzer> = Arc::new(FixedAnalyzer(Some((canned_analysis(), 42))));
        let services = test_services(store.clone(), metrics, llm);

        let worker = BatchWorker::new("alice".to_string(), services);
        let outcome = worker.run_once().await.expect("run_once should succeed");
        assert_eq!(outcome, Outcome::Done);

        let incidents = store.list_recent("alice", 10).await.expect("store should be readable");
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].title, "CPU saturation");
        assert_eq!(incidents[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn run_once_is_empty_when_metrics_backend_returns_nothing() {
        let store = Arc::new(InMemoryObservabilityStore::new());
        let metrics: Arc<dyn MetricsFetcher> = Arc::new(FixedMetrics(Vec::new()));
        let llm: Arc<dyn Analyzer> = Arc::new(FixedAnalyzer(Some((canned_analysis(), 42))));
        let services = test_services(store.clone(), metrics, llm);

        let worker = BatchWorker::new("alice".to_string(), services);
        let outcome = worker.run_once().await.expect("run_once should succeed");
        assert_eq!(outcome, Outcome::Empty);
        assert!(store.list_recent("alice", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_once_fails_when_both_llm_providers_are_exhausted() {
        let store = Arc::new(InMemoryObservabilityStore::new());
        let metrics: Arc<dyn MetricsFetcher> = Arc::new(FixedMetrics(vec![sample_metric()]));
        let llm: Arc<dyn Analyzer> = Arc::new(FixedAnalyzer(None));
        let services = test_services(store.clone(), metrics, llm);

        let worker = BatchWorker::new("alice".to_string(), services);
        let outcome = worker.run_once().await.expect("run_once should succeed");
        assert_eq!(outcome, Outcome::Fail);
    }

    #[tokio::test]
    async fn run_once_is_idempotent_for_an_already_processed_window() {
        let store = Arc::new(InMemoryObservabilityStore::new());
        let metrics: Arc<dyn MetricsFetcher> = Arc::new(FixedMetrics(vec![sample_metric()]));
        let llm: Arc<dyn Analyzer> = Arc::new(FixedAnalyzer(Some((canned_analysis(), 42))));
        let services = test_services(store.clone(), metrics, llm);

        let worker = BatchWorker::new("alice".to_string(), services);
        let first = worker.run_once().await.expect("run_once should succeed");
        assert_eq!(first, Outcome::Done);

        let second = worker.run_once().await.expect("run_once should succeed");
        assert_eq!(second, Outcome::Skip);
        // Re-running the same window must not duplicate the incident.
        assert_eq!(store.list_recent("alice", 10).await.unwrap().len(), 1);
    }

    #[test]
    fn build_prompt_groups_by_instance_and_includes_schema() {
        let metrics = vec![
            MetricSample { name: "cpu_usage".to_string(), value: Value::from(97.5), instance: "b:9100".to_string(), user_id: "u1".to_string() },
            MetricSample { name: "mem_usage".to_string(), value: Value::from(50.0), instance: "a:9100".to_string(), user_id: "u1".to_string() },
        ];
        let prompt = build_prompt(&metrics, &batch_config(), "2025-01-01 00:00:00", "2025-01-01 00:02:00");
        assert!(prompt.contains("### Instance: a:9100"));
        assert!(prompt.contains("### Instance: b:9100"));
        assert!(prompt.contains("\"severity\": \"low|medium|high|critical\""));
        assert!(prompt.find("### Instance: a:9100").unwrap() < prompt.find("### Instance: b:9100").unwrap());
    }

    #[test]
    fn build_prompt_caps_at_max_metrics() {
        let metrics: Vec<MetricSample> = (0..5)
            .map(|i| MetricSample { name: format!("m{i}"), value: Value::from(1), instance: "a:9100".to_string(), user_id: "u1".to_string() })
            .collect();
        let mut cfg = batch_config();
        cfg.max_metrics = 2;
        let prompt = build_prompt(&metrics, &cfg, "s", "e");
        assert!(prompt.contains("capped at 2"));
    }
}
