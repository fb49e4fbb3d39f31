//! Shared service bundle: every long-lived dependency the scheduler, batch
//! workers, and retention janitor need, constructed once at process start
//! and handed out by `Arc`.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::data_stores::ComprehensiveObservabilityStore;
use crate::http::{HttpClient, HttpClientConfig};
use crate::llm::tracing::TraceClient;
use crate::llm::{Analyzer, LlmGateway};
use crate::metrics_source::{MetricsFetcher, MetricsSource};
use crate::notifier::Notifier;

/// Every long-lived dependency the scheduler, batch workers, and retention
/// janitor need. `metrics_source` and `llm` are trait objects rather than the
/// concrete HTTP-backed types so tests can substitute a fixed fixture for
/// `BatchWorker::run_once` without issuing real network calls.
pub struct Services {
    pub config: Config,
    pub metrics_source: Arc<dyn MetricsFetcher>,
    pub llm: Arc<dyn Analyzer>,
    pub notifier: Notifier,
    pub store: Arc<dyn ComprehensiveObservabilityStore>,
    pub tracer: Arc<TraceClient>,
}

impl Services {
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let http_config = HttpClientConfig {
            user_agent: format!("argus-monitor/{}", env!("CARGO_PKG_VERSION")),
            ..HttpClientConfig::default()
        };
        let http_client =
            Arc::new(HttpClient::new(http_config).context("failed to build HTTP client")?);

        let tracer = Arc::new(TraceClient::new(&config.tracing, http_client.clone()));

        let store = build_store(&config).await?;

        let metrics_source: Arc<dyn MetricsFetcher> =
            Arc::new(MetricsSource::new(http_client.clone(), config.metrics_source.clone()));
        let llm: Arc<dyn Analyzer> =
            Arc::new(LlmGateway::new(http_client.clone(), config.llm.clone(), tracer.clone()));
        let notifier = Notifier::new(http_client.clone(), config.notifications.clone());

        Ok(Arc::new(Self { config, metrics_source, llm, notifier, store, tracer }))
    }
}

#[cfg(feature = "mongodb-store")]
async fn build_store(
    config: &Config,
) -> Result<Arc<dyn ComprehensiveObservabilityStore>> {
    let store = crate::data_stores::mongo::MongoObservabilityStore::connect(&config.store)
        .await
        .context("failed to connect to the MongoDB data store")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "mongodb-store"))]
async fn build_store(
    _config: &Config,
) -> Result<Arc<dyn ComprehensiveObservabilityStore>> {
    Ok(Arc::new(crate::data_stores::memory::InMemoryObservabilityStore::new()))
}

/// Test-only helper for assembling a `Services` bundle from fixed fixtures,
/// so `BatchWorker`/`Scheduler` can be exercised without a real metrics
/// backend, LLM provider, or notification transport.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{
        BatchConfig, LlmConfig, MetricsSourceConfig, NotificationsConfig, SchedulerConfig,
        StoreConfig, TracingConfig,
    };

    pub(crate) fn test_config() -> Config {
        Config {
            metrics_source: MetricsSourceConfig {
                url: "http://localhost:9090".to_string(),
                request_timeout_secs: 5,
            },
            llm: LlmConfig {
                primary_api_key: "test".to_string(),
                primary_model: "test-model".to_string(),
                secondary_url: "http://localhost:11434".to_string(),
                secondary_model: "test-model".to_string(),
                timeout_secs: 5,
                temperature: 0.2,
            },
            store: StoreConfig {
                url: "memory".to_string(),
                database_name: "test".to_string(),
                max_documents_per_collection: 1000,
            },
            batch: BatchConfig { interval_minutes: 2, max_metrics: 600, max_metrics_per_instance: 200 },
            notifications: NotificationsConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 587,
                smtp_username: "test".to_string(),
                smtp_password: "test".to_string(),
                from_address: "test@example.com".to_string(),
            },
            tracing: TracingConfig {
                enabled: false,
                public_key: String::new(),
                secret_key: String::new(),
                host: "https://example.invalid".to_string(),
            },
            scheduler: SchedulerConfig {
                reconciliation_interval_secs: 300,
                retention_sweep_interval_secs: 3600,
                chat_session_max_age_hours: 720,
            },
        }
    }

    /// Builds a `Services` bundle around a caller-supplied in-memory store
    /// (so tests can seed targets/ledger entries and inspect results
    /// afterwards) plus fixed metrics/LLM fixtures. No network call can
    /// occur as a side effect of running it.
    pub(crate) fn test_services(
        store: Arc<crate::data_stores::memory::InMemoryObservabilityStore>,
        metrics: Arc<dyn MetricsFetcher>,
        llm: Arc<dyn Analyzer>,
    ) -> Arc<Services> {
        let config = test_config();
        let http_client = Arc::new(HttpClient::new(HttpClientConfig::default()).unwrap());
        let store: Arc<dyn ComprehensiveObservabilityStore> = store;
        let tracer = Arc::new(TraceClient::disabled());
        let notifier = Notifier::new(http_client, config.notifications.clone());

        Arc::new(Services { config, metrics_source: metrics, llm, notifier, store, tracer })
    }
}
