//! In-memory store: no external dependencies, used by tests and by
//! deployments that don't need durability across restarts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::errors::DataStoreResult;
use crate::models::{
    Anomaly, ChatSession, Incident, MetricsBatch, NotificationConfig, RcaRecord, Target,
    WindowLedgerEntry,
};

use super::traits::{
    AnomalyStore, ChatSessionStore, ComprehensiveObservabilityStore, IncidentStore, LedgerStore,
    MetricsBatchStore, NotificationConfigStore, ObservabilityDataStore, RcaStore, RetentionStore,
    TargetStore,
};

#[derive(Default)]
pub struct InMemoryObservabilityStore {
    batches: DashMap<String, Vec<MetricsBatch>>,
    incidents: DashMap<String, Vec<Incident>>,
    anomalies: DashMap<String, Vec<Anomaly>>,
    rca: DashMap<String, Vec<RcaRecord>>,
    ledger: DashMap<(String, String, String), WindowLedgerEntry>,
    targets: DashMap<String, Vec<Target>>,
    notifications: DashMap<String, Vec<NotificationConfig>>,
    sessions: DashMap<String, ChatSession>,
    next_id: AtomicU64,
}

impl InMemoryObservabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("mem-{id}")
    }

    /// Test/bootstrap helper: register a target directly rather than via a
    /// CRUD endpoint, which is out of this crate's scope.
    pub fn seed_target(&self, target: Target) {
        self.targets.entry(target.user_id.clone()).or_default().push(target);
    }
}

#[async_trait]
impl ObservabilityDataStore for InMemoryObservabilityStore {
    async fn initialize(&self) -> DataStoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> DataStoreResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> DataStoreResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl MetricsBatchStore for InMemoryObservabilityStore {
    async fn store_batch(&self, batch: &MetricsBatch) -> DataStoreResult<()> {
        let mut batch = batch.clone();
        if batch.id.is_none() {
            batch.id = Some(self.fresh_id());
        }
        self.batches.entry(batch.user_id.clone()).or_default().push(batch);
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for InMemoryObservabilityStore {
    async fn store_incident(&self, incident: &Incident) -> DataStoreResult<()> {
        let mut incident = incident.clone();
        if incident.id.is_none() {
            incident.id = Some(self.fresh_id());
        }
        self.incidents.entry(incident.user_id.clone()).or_default().push(incident);
        Ok(())
    }

    async fn list_recent(&self, user_id: &str, limit: usize) -> DataStoreResult<Vec<Incident>> {
        let mut items = self.incidents.get(user_id).map(|v| v.clone()).unwrap_or_default();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        Ok(items)
    }
}

#[async_trait]
impl AnomalyStore for InMemoryObservabilityStore {
    async fn store_anomalies(&self, anomalies: &[Anomaly]) -> DataStoreResult<()> {
        for anomaly in anomalies {
            let mut anomaly = anomaly.clone();
            if anomaly.id.is_none() {
                anomaly.id = Some(self.fresh_id());
            }
            self.anomalies.entry(anomaly.user_id.clone()).or_default().push(anomaly);
        }
        Ok(())
    }
}

#[async_trait]
impl RcaStore for InMemoryObservabilityStore {
    async fn store_rca(&self, rca: &RcaRecord) -> DataStoreResult<()> {
        let mut rca = rca.clone();
        if rca.id.is_none() {
            rca.id = Some(self.fresh_id());
        }
        self.rca.entry(rca.user_id.clone()).or_default().push(rca);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryObservabilityStore {
    async fn is_processed(
        &self,
        user_id: &str,
        window_start: &str,
        window_end: &str,
    ) -> DataStoreResult<bool> {
        let key = (user_id.to_string(), window_start.to_string(), window_end.to_string());
        Ok(self.ledger.contains_key(&key))
    }

    async fn mark_processed(&self, entry: &WindowLedgerEntry) -> DataStoreResult<()> {
        let key = (
            entry.user_id.clone(),
            entry.window_start_str.clone(),
            entry.window_end_str.clone(),
        );
        self.ledger.entry(key).or_insert_with(|| entry.clone());
        Ok(())
    }
}

#[async_trait]
impl TargetStore for InMemoryObservabilityStore {
    async fn list_active_tenants(&self) -> DataStoreResult<Vec<String>> {
        let mut tenants = HashSet::new();
        for entry in self.targets.iter() {
            if entry.value().iter().any(|t| t.enabled) {
                tenants.insert(entry.key().clone());
            }
        }
        Ok(tenants.into_iter().collect())
    }

    async fn list_targets(&self, user_id: &str) -> DataStoreResult<Vec<Target>> {
        Ok(self.targets.get(user_id).map(|v| v.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl NotificationConfigStore for InMemoryObservabilityStore {
    async fn list_enabled_notifications(
        &self,
        user_id: &str,
    ) -> DataStoreResult<Vec<NotificationConfig>> {
        Ok(self
            .notifications
            .get(user_id)
            .map(|v| v.iter().filter(|n| n.enabled).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatSessionStore for InMemoryObservabilityStore {
    async fn get_session(&self, session_id: &str) -> DataStoreResult<Option<ChatSession>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn upsert_session(&self, session: &ChatSession) -> DataStoreResult<()> {
        self.sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn evict_inactive_sessions(&self, cutoff: DateTime<Utc>) -> DataStoreResult<usize> {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.value().last_active < cutoff)
            .map(|e| e.key().clone())
            .collect();
        for key in &stale {
            self.sessions.remove(key);
        }
        Ok(stale.len())
    }
}

#[async_trait]
impl RetentionStore for InMemoryObservabilityStore {
    async fn enforce_retention(
        &self,
        user_id: &str,
        max_documents_per_collection: usize,
    ) -> DataStoreResult<()> {
        trim_oldest(&self.batches, user_id, max_documents_per_collection, |b| b.collected_at);
        trim_oldest(&self.incidents, user_id, max_documents_per_collection, |i| i.created_at);
        trim_oldest(&self.anomalies, user_id, max_documents_per_collection, |a| a.created_at);
        trim_oldest(&self.rca, user_id, max_documents_per_collection, |r| r.timestamp);
        Ok(())
    }
}

fn trim_oldest<T: Clone>(
    map: &DashMap<String, Vec<T>>,
    user_id: &str,
    cap: usize,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
) {
    if let Some(mut items) = map.get_mut(user_id) {
        if items.len() <= cap {
            return;
        }
        items.sort_by_key(|item| timestamp(item));
        let excess = items.len() - cap;
        items.drain(0..excess);
    }
}

impl ComprehensiveObservabilityStore for InMemoryObservabilityStore {
    fn store_type(&self) -> &'static str {
        "memory"
    }
}
