//! Instance validation and primary-instance attribution.
//!
//! Only strings that look like a real scrape target (`ip:port`, `host:port`,
//! or bracketed IPv6 with optional port) are ever treated as an "instance" —
//! this keeps an LLM hallucinating a phrase like "all nodes" from polluting
//! stored records.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Anomaly, Incident, MetricSample};

static INSTANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^(
            \[[0-9a-fA-F:]+\](:\d+)?   |  # [::1]:9182
            [A-Za-z0-9.\-]+:\d+        |  # host:port
            \d{1,3}(\.\d{1,3}){3}(:\d+)?  # ipv4[:port]
        )$
        ",
    )
    .expect("instance regex is valid")
});

/// True if `value` looks like a real Prometheus-style instance label.
pub fn looks_like_instance(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    INSTANCE_RE.is_match(trimmed)
}

/// Split `host:port` / `[ipv6]:port` / bare host into `(host_or_ip, port)`.
pub fn parse_instance(instance: &str) -> (String, Option<u16>) {
    let inst = instance.trim();
    if inst.is_empty() {
        return ("unknown".to_string(), None);
    }

    if let Some(rest) = inst.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            let host = &rest[..close];
            let after = &rest[close + 1..];
            let port = after.strip_prefix(':').and_then(|p| p.parse::<u16>().ok());
            return (host.to_string(), port);
        }
    }

    if let Some(idx) = inst.rfind(':') {
        let (host, port_str) = (&inst[..idx], &inst[idx + 1..]);
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), Some(port));
        }
    }

    (inst.to_string(), None)
}

/// First valid instance found across anomalies, then incident evidence, then
/// raw metric samples — in that order. `"unknown"` if none validate.
pub fn pick_primary(metrics: &[MetricSample], incident: &Incident, anomalies: &[Anomaly]) -> String {
    for anomaly in anomalies {
        if looks_like_instance(&anomaly.instance) {
            return anomaly.instance.clone();
        }
    }
    for evidence in &incident.evidence {
        if looks_like_instance(&evidence.instance) {
            return evidence.instance.clone();
        }
    }
    for sample in metrics {
        if looks_like_instance(&sample.instance) {
            return sample.instance.clone();
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Evidence, FixPlan, Severity};

    #[test]
    fn accepts_valid_forms() {
        assert!(looks_like_instance("10.0.0.4:9100"));
        assert!(looks_like_instance("[::1]:9182"));
        assert!(looks_like_instance("host-01:9090"));
        assert!(looks_like_instance("10.0.0.4"));
    }

    #[test]
    fn rejects_prose_and_empty() {
        assert!(!looks_like_instance("all windows servers"));
        assert!(!looks_like_instance(""));
        assert!(!looks_like_instance("blast radius"));
    }

    #[test]
    fn parse_instance_handles_ipv6_brackets() {
        assert_eq!(parse_instance("[::1]:9182"), ("::1".to_string(), Some(9182)));
        assert_eq!(parse_instance("host:9090"), ("host".to_string(), Some(9090)));
        assert_eq!(parse_instance("host"), ("host".to_string(), None));
    }

    fn sample_incident(evidence_instance: &str) -> Incident {
        Incident {
            id: None,
            user_id: "u1".to_string(),
            batch_id: "b1".to_string(),
            window_start: chrono::Utc::now(),
            window_end: chrono::Utc::now(),
            window_start_str: String::new(),
            window_end_str: String::new(),
            created_at: chrono::Utc::now(),
            title: "t".to_string(),
            severity: Severity::Low,
            confidence: 0.0,
            summary: String::new(),
            root_cause: String::new(),
            contributing_factors: vec![],
            blast_radius: String::new(),
            evidence: vec![Evidence {
                metric: "cpu".to_string(),
                instance: evidence_instance.to_string(),
                value: 0.0,
                why_it_matters: String::new(),
            }],
            fix_plan: FixPlan { immediate: vec![], next_24h: vec![], prevention: vec![] },
            clusters: vec![],
            raw_analysis: serde_json::json!({}),
            primary_instance: "unknown".to_string(),
            ip: "unknown".to_string(),
            port: None,
            session_id: String::new(),
        }
    }

    #[test]
    fn pick_primary_falls_back_through_precedence() {
        let incident = sample_incident("10.0.0.9:9100");
        let anomalies = vec![Anomaly {
            id: None,
            user_id: "u1".to_string(),
            batch_id: "b1".to_string(),
            incident_id: "i1".to_string(),
            metric: "cpu".to_string(),
            instance: "all nodes".to_string(),
            ip: "unknown".to_string(),
            port: None,
            observed: 0.0,
            expected: String::new(),
            symptom: String::new(),
            cluster: String::new(),
            severity: Severity::Medium,
            created_at: chrono::Utc::now(),
            window_start_str: String::new(),
            window_end_str: String::new(),
            session_id: String::new(),
        }];
        assert_eq!(pick_primary(&[], &incident, &anomalies), "10.0.0.9:9100");
    }

    #[test]
    fn pick_primary_defaults_to_unknown() {
        let incident = sample_incident("all nodes");
        assert_eq!(pick_primary(&[], &incident, &[]), "unknown");
    }
}
