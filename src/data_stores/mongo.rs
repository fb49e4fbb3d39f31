//! MongoDB-backed implementation of `ComprehensiveObservabilityStore`.
//!
//! One collection per entity, scoped by `user_id`. Typed collections let
//! serde do the document conversion instead of hand-rolled bson mapping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, FindOptions, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::config::StoreConfig;
use crate::errors::DataStoreError;
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

pub struct MongoObservabilityStore {
    database: Database,
}

impl MongoObservabilityStore {
    pub async fn connect(config: &StoreConfig) -> DataStoreResult<Self> {
        let options = ClientOptions::parse(&config.url)
            .await
            .map_err(|e| DataStoreError::Connection(e.to_string()))?;
        let client = Client::with_options(options).map_err(|e| DataStoreError::Connection(e.to_string()))?;
        let database = client.database(&config.database_name);

        let store = Self { database };
        store.create_indexes().await?;
        Ok(store)
    }

    async fn create_indexes(&self) -> DataStoreResult<()> {
        let ledger_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "window_start_str": 1, "window_end_str": 1 })
            .options(mongodb::options::IndexOptions::builder().unique(true).build())
            .build();
        self.ledger()
            .create_index(ledger_index)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;

        let session_index = IndexModel::builder().keys(doc! { "session_id": 1 }).build();
        self.sessions()
            .create_index(session_index)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn batches(&self) -> Collection<MetricsBatch> {
        self.database.collection("metrics_batches")
    }
    fn incidents(&self) -> Collection<Incident> {
        self.database.collection("incidents")
    }
    fn anomalies(&self) -> Collection<Anomaly> {
        self.database.collection("anomalies")
    }
    fn rca(&self) -> Collection<RcaRecord> {
        self.database.collection("rca_records")
    }
    fn ledger(&self) -> Collection<WindowLedgerEntry> {
        self.database.collection("window_ledger")
    }
    fn targets(&self) -> Collection<Target> {
        self.database.collection("targets")
    }
    fn notifications(&self) -> Collection<NotificationConfig> {
        self.database.collection("notification_configs")
    }
    fn sessions(&self) -> Collection<ChatSession> {
        self.database.collection("chat_sessions")
    }
}

#[async_trait]
impl ObservabilityDataStore for MongoObservabilityStore {
    async fn initialize(&self) -> DataStoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> DataStoreResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> DataStoreResult<bool> {
        match self.database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl MetricsBatchStore for MongoObservabilityStore {
    async fn store_batch(&self, batch: &MetricsBatch) -> DataStoreResult<()> {
        self.batches()
            .insert_one(batch)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for MongoObservabilityStore {
    async fn store_incident(&self, incident: &Incident) -> DataStoreResult<()> {
        self.incidents()
            .insert_one(incident)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_recent(&self, user_id: &str, limit: usize) -> DataStoreResult<Vec<Incident>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit as i64)
            .build();
        let cursor = self
            .incidents()
            .find(doc! { "user_id": user_id })
            .with_options(options)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl AnomalyStore for MongoObservabilityStore {
    async fn store_anomalies(&self, anomalies: &[Anomaly]) -> DataStoreResult<()> {
        if anomalies.is_empty() {
            return Ok(());
        }
        self.anomalies()
            .insert_many(anomalies)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RcaStore for MongoObservabilityStore {
    async fn store_rca(&self, rca: &RcaRecord) -> DataStoreResult<()> {
        self.rca()
            .insert_one(rca)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MongoObservabilityStore {
    async fn is_processed(
        &self,
        user_id: &str,
        window_start: &str,
        window_end: &str,
    ) -> DataStoreResult<bool> {
        let found = self
            .ledger()
            .find_one(doc! {
                "user_id": user_id,
                "window_start_str": window_start,
                "window_end_str": window_end,
            })
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    async fn mark_processed(&self, entry: &WindowLedgerEntry) -> DataStoreResult<()> {
        let filter = doc! {
            "user_id": &entry.user_id,
            "window_start_str": &entry.window_start_str,
            "window_end_str": &entry.window_end_str,
        };
        let update = doc! {
            "$setOnInsert": mongodb::bson::to_bson(entry)
                .map_err(|e| DataStoreError::Serialization(e.to_string()))?,
        };
        let options = UpdateOptions::builder().upsert(true).build();
        // A unique index backs this collection, so a racing duplicate insert
        // surfaces as a benign "already processed" outcome, not an error.
        match self.ledger().update_one(filter, update).with_options(options).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("E11000") => Ok(()),
            Err(e) => Err(DataStoreError::Database(e.to_string())),
        }
    }
}

#[async_trait]
impl TargetStore for MongoObservabilityStore {
    async fn list_active_tenants(&self) -> DataStoreResult<Vec<String>> {
        let tenants: Vec<String> = self
            .targets()
            .distinct("user_id", doc! { "enabled": true })
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?
            .into_iter()
            .filter_map(|b| mongodb::bson::from_bson::<String>(b).ok())
            .collect();
        Ok(tenants)
    }

    async fn list_targets(&self, user_id: &str) -> DataStoreResult<Vec<Target>> {
        let cursor = self
            .targets()
            .find(doc! { "user_id": user_id })
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl NotificationConfigStore for MongoObservabilityStore {
    async fn list_enabled_notifications(
        &self,
        user_id: &str,
    ) -> DataStoreResult<Vec<NotificationConfig>> {
        let cursor = self
            .notifications()
            .find(doc! { "user_id": user_id, "enabled": true })
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl ChatSessionStore for MongoObservabilityStore {
    async fn get_session(&self, session_id: &str) -> DataStoreResult<Option<ChatSession>> {
        self.sessions()
            .find_one(doc! { "session_id": session_id })
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))
    }

    async fn upsert_session(&self, session: &ChatSession) -> DataStoreResult<()> {
        let update = doc! {
            "$set": mongodb::bson::to_bson(session)
                .map_err(|e| DataStoreError::Serialization(e.to_string()))?,
        };
        let options = UpdateOptions::builder().upsert(true).build();
        self.sessions()
            .update_one(doc! { "session_id": &session.session_id }, update)
            .with_options(options)
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn evict_inactive_sessions(&self, cutoff: DateTime<Utc>) -> DataStoreResult<usize> {
        let result = self
            .sessions()
            .delete_many(doc! { "last_active": { "$lt": cutoff } })
            .await
            .map_err(|e| DataStoreError::Database(e.to_string()))?;
        Ok(result.deleted_count as usize)
    }
}

#[async_trait]
impl RetentionStore for MongoObservabilityStore {
    async fn enforce_retention(
        &self,
        user_id: &str,
        max_documents_per_collection: usize,
    ) -> DataStoreResult<()> {
        trim_collection(&self.batches(), user_id, "collected_at", max_documents_per_collection).await?;
        trim_collection(&self.incidents(), user_id, "created_at", max_documents_per_collection).await?;
        trim_collection(&self.anomalies(), user_id, "created_at", max_documents_per_collection).await?;
        trim_collection(&self.rca(), user_id, "timestamp", max_documents_per_collection).await?;
        Ok(())
    }
}

/// Deletes the oldest documents for `user_id` beyond `cap`, ordered by
/// `timestamp_field` ascending.
async fn trim_collection<T>(
    collection: &Collection<T>,
    user_id: &str,
    timestamp_field: &str,
    cap: usize,
) -> DataStoreResult<()>
where
    T: Send + Sync + serde::de::DeserializeOwned + Unpin,
{
    let total = collection
        .count_documents(doc! { "user_id": user_id })
        .await
        .map_err(|e| DataStoreError::Database(e.to_string()))?;

    if (total as usize) <= cap {
        return Ok(());
    }

    let excess = total as usize - cap;
    let options = FindOptions::builder()
        .sort(doc! { timestamp_field: 1 })
        .limit(excess as i64)
        .projection(doc! { "_id": 1 })
        .build();

    let cursor = collection
        .clone_with_type::<mongodb::bson::Document>()
        .find(doc! { "user_id": user_id })
        .with_options(options)
        .await
        .map_err(|e| DataStoreError::Database(e.to_string()))?;

    let stale_ids: Vec<mongodb::bson::Bson> = cursor
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| DataStoreError::Database(e.to_string()))?
        .into_iter()
        .filter_map(|d| d.get("_id").cloned())
        .collect();

    if stale_ids.is_empty() {
        return Ok(());
    }

    collection
        .clone_with_type::<mongodb::bson::Document>()
        .delete_many(doc! { "_id": { "$in": stale_ids } })
        .await
        .map_err(|e| DataStoreError::Database(e.to_string()))?;

    Ok(())
}

impl ComprehensiveObservabilityStore for MongoObservabilityStore {
    fn store_type(&self) -> &'static str {
        "mongodb"
    }
}
