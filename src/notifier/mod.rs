//! Alert fan-out: a detected incident is rendered once and dispatched to
//! every enabled notification channel for the tenant.

mod chat;
mod email;

use std::sync::Arc;

use log::warn;

use crate::config::NotificationsConfig;
use crate::http::HttpClient;
use crate::models::{Incident, NotificationChannel, NotificationConfig};

pub struct Notifier {
    client: Arc<HttpClient>,
    smtp: NotificationsConfig,
}

impl Notifier {
    pub fn new(client: Arc<HttpClient>, smtp: NotificationsConfig) -> Self {
        Self { client, smtp }
    }

    /// Sends `incident` to every enabled channel in `configs`. Failures are
    /// logged and otherwise swallowed — a notification failure never fails
    /// the batch tick, since the incident is already durably persisted.
    pub async fn notify(
        &self,
        configs: &[NotificationConfig],
        incident: &Incident,
        anomaly_count: usize,
        session_id: &str,
    ) {
        if configs.is_empty() {
            return;
        }

        let severity = incident.severity.as_str().to_ascii_uppercase();
        let text = render_text(incident, &severity, anomaly_count, session_id);

        for config in configs {
            if !config.enabled {
                continue;
            }
            match config.channel {
                NotificationChannel::Chat => {
                    if let Err(e) = chat::send(&self.client, &config.destination, &text).await {
                        warn!("[notifier] chat alert failed for {}: {e}", incident.user_id);
                    }
                }
                NotificationChannel::Email => {
                    let subject = format!("[{severity}] {}", incident.title);
                    let body = render_html(incident, &severity, anomaly_count);
                    if let Err(e) = email::send(&self.smtp, &config.destination, &subject, &body).await {
                        warn!("[notifier] email alert failed for {}: {e}", incident.user_id);
                    }
                }
            }
        }
    }
}

fn immediate_actions(incident: &Incident) -> String {
    if incident.fix_plan.immediate.is_empty() {
        "None".to_string()
    } else {
        incident.fix_plan.immediate.join(", ")
    }
}

fn render_text(incident: &Incident, severity: &str, anomaly_count: usize, session_id: &str) -> String {
    format!(
        "[{severity}] {}\nWindow: {} -> {}\n{}\nRoot cause: {}\nBlast radius: {}\nActions: {}\nInstance: {}\nAnomalies: {anomaly_count}\nSession: {session_id}",
        incident.title,
        incident.window_start_str,
        incident.window_end_str,
        incident.summary,
        incident.root_cause,
        incident.blast_radius,
        immediate_actions(incident),
        incident.primary_instance,
    )
}

fn render_html(incident: &Incident, severity: &str, anomaly_count: usize) -> String {
    let actions: String = if incident.fix_plan.immediate.is_empty() {
        "<li>None</li>".to_string()
    } else {
        incident.fix_plan.immediate.iter().map(|a| format!("<li>{a}</li>")).collect()
    };

    format!(
        "<h2>[{severity}] {}</h2>\
         <p><b>Window:</b> {} -> {}</p>\
         <p><b>Summary:</b> {}</p>\
         <p><b>Root Cause:</b> {}</p>\
         <p><b>Blast Radius:</b> {}</p>\
         <p><b>Instance:</b> {}</p>\
         <p><b>Immediate Actions:</b></p><ul>{actions}</ul>\
         <p><b>Anomalies:</b> {anomaly_count} | <b>Confidence:</b> {:.0}%</p>",
        incident.title,
        incident.window_start_str,
        incident.window_end_str,
        incident.summary,
        incident.root_cause,
        incident.blast_radius,
        incident.primary_instance,
        incident.confidence * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cluster, Evidence, FixPlan, Severity};
    use chrono::Utc;
    use serde_json::json;

    fn sample_incident() -> Incident {
        Incident {
            id: None,
            user_id: "alice".to_string(),
            batch_id: "b1".to_string(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            window_start_str: "09:00".to_string(),
            window_end_str: "09:05".to_string(),
            created_at: Utc::now(),
            title: "CPU saturation".to_string(),
            severity: Severity::High,
            confidence: 0.9,
            summary: "CPU pinned at 100%".to_string(),
            root_cause: "runaway goroutine".to_string(),
            contributing_factors: vec![],
            blast_radius: "single instance".to_string(),
            evidence: Vec::<Evidence>::new(),
            fix_plan: FixPlan::default(),
            clusters: Vec::<Cluster>::new(),
            raw_analysis: json!({}),
            primary_instance: "10.0.0.5:9100".to_string(),
            ip: "10.0.0.5".to_string(),
            port: Some(9100),
            session_id: "s1".to_string(),
        }
    }

    #[test]
    fn render_text_uppercases_severity_and_includes_documented_fields() {
        let incident = sample_incident();
        let text = render_text(&incident, "HIGH", 3, "s1");
        assert!(text.contains("[HIGH]"));
        assert!(text.contains("CPU saturation"));
        assert!(text.contains("runaway goroutine"));
        assert!(text.contains("09:00 -> 09:05"));
        assert!(text.contains("single instance"));
        assert!(text.contains("Anomalies: 3"));
        assert!(text.contains("Session: s1"));
    }

    #[test]
    fn render_html_escapes_nothing_but_includes_fields() {
        let incident = sample_incident();
        let html = render_html(&incident, "HIGH", 3);
        assert!(html.contains("<h2>[HIGH] CPU saturation</h2>"));
        assert!(html.contains("10.0.0.5:9100"));
        assert!(html.contains("Confidence:</b> 90%"));
    }
}
