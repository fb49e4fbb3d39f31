//! Per-entity storage traits, combined into a single store handle.
//!
//! Every operation is scoped by `user_id` directly on the model it
//! operates on rather than through a separate tenant-context wrapper —
//! each stored entity already carries its own tenant key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::DataStoreResult;
use crate::models::{
    Anomaly, ChatSession, Incident, MetricsBatch, NotificationConfig, RcaRecord, Target,
    WindowLedgerEntry,
};

/// Lifecycle operations every backing store must provide.
#[async_trait]
pub trait ObservabilityDataStore: Send + Sync {
    async fn initialize(&self) -> DataStoreResult<()>;
    async fn close(&self) -> DataStoreResult<()>;
    async fn health_check(&self) -> DataStoreResult<bool>;
}

#[async_trait]
pub trait MetricsBatchStore: Send + Sync {
    async fn store_batch(&self, batch: &MetricsBatch) -> DataStoreResult<()>;
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn store_incident(&self, incident: &Incident) -> DataStoreResult<()>;
    async fn list_recent(&self, user_id: &str, limit: usize) -> DataStoreResult<Vec<Incident>>;
}

#[async_trait]
pub trait AnomalyStore: Send + Sync {
    async fn store_anomalies(&self, anomalies: &[Anomaly]) -> DataStoreResult<()>;
}

#[async_trait]
pub trait RcaStore: Send + Sync {
    async fn store_rca(&self, rca: &RcaRecord) -> DataStoreResult<()>;
}

/// The window ledger is the idempotence gate: a window is eligible for
/// processing only while no ledger entry for `(user_id, window_start,
/// window_end)` exists.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn is_processed(
        &self,
        user_id: &str,
        window_start: &str,
        window_end: &str,
    ) -> DataStoreResult<bool>;

    /// Records the window as processed. Implementations must treat a
    /// duplicate key as success, not an error — two workers racing on the
    /// same window should both observe "processed" afterwards.
    async fn mark_processed(&self, entry: &WindowLedgerEntry) -> DataStoreResult<()>;
}

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Distinct `user_id`s with at least one enabled target — the set the
    /// scheduler reconciles workers against.
    async fn list_active_tenants(&self) -> DataStoreResult<Vec<String>>;
    async fn list_targets(&self, user_id: &str) -> DataStoreResult<Vec<Target>>;
}

#[async_trait]
pub trait NotificationConfigStore: Send + Sync {
    async fn list_enabled_notifications(
        &self,
        user_id: &str,
    ) -> DataStoreResult<Vec<NotificationConfig>>;
}

#[async_trait]
pub trait ChatSessionStore: Send + Sync {
    async fn get_session(&self, session_id: &str) -> DataStoreResult<Option<ChatSession>>;
    async fn upsert_session(&self, session: &ChatSession) -> DataStoreResult<()>;
    /// Evicts sessions whose `last_active` is older than `cutoff`, returning
    /// the number removed.
    async fn evict_inactive_sessions(&self, cutoff: DateTime<Utc>) -> DataStoreResult<usize>;
}

/// Trims append-only collections (metrics batches, incidents, anomalies,
/// RCA records) for a tenant down to `max_documents_per_collection`,
/// oldest first.
#[async_trait]
pub trait RetentionStore: Send + Sync {
    async fn enforce_retention(
        &self,
        user_id: &str,
        max_documents_per_collection: usize,
    ) -> DataStoreResult<()>;
}

/// The full storage surface the batch worker, scheduler, notifier, and
/// retention janitor depend on. A backing implementation (MongoDB, or an
/// in-memory store for tests) satisfies every sub-trait at once.
#[async_trait]
pub trait ComprehensiveObservabilityStore:
    ObservabilityDataStore
    + MetricsBatchStore
    + IncidentStore
    + AnomalyStore
    + RcaStore
    + LedgerStore
    + TargetStore
    + NotificationConfigStore
    + ChatSessionStore
    + RetentionStore
{
    fn store_type(&self) -> &'static str;
}
