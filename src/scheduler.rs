//! Tenant scheduler: periodically reconciles the set of active tenants
//! against a map of running batch workers, starting new ones and tearing
//! down ones for tenants that no longer have an enabled target.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::batch_worker::BatchWorker;
use crate::services::Services;

struct WorkerHandle {
    join: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

pub struct Scheduler {
    services: Arc<Services>,
    workers: RwLock<HashMap<String, WorkerHandle>>,
}

impl Scheduler {
    pub fn new(services: Arc<Services>) -> Arc<Self> {
        Arc::new(Self { services, workers: RwLock::new(HashMap::new()) })
    }

    /// Runs reconciliation on a fixed interval until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let interval = self.services.config.scheduler.reconciliation_interval_secs;
        loop {
            if let Err(e) = self.reconcile().await {
                error!("[scheduler] reconciliation failed: {e}");
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                _ = &mut shutdown => {
                    info!("[scheduler] shutdown requested");
                    break;
                }
            }
        }

        self.shutdown_all().await;
    }

    async fn reconcile(&self) -> anyhow::Result<()> {
        let active: HashSet<String> = self.services.store.list_active_tenants().await?.into_iter().collect();
        let mut workers = self.workers.write().await;

        let stale: Vec<String> = workers.keys().filter(|id| !active.contains(*id)).cloned().collect();
        for user_id in stale {
            if let Some(handle) = workers.remove(&user_id) {
                info!("[scheduler] stopping worker for {user_id} (no longer active)");
                handle.cancelled.store(true, Ordering::Relaxed);
                if let Err(e) = handle.join.await {
                    if !e.is_cancelled() {
                        error!("[scheduler] worker for {user_id} panicked: {e}");
                    }
                }
            }
        }

        for user_id in active {
            if workers.contains_key(&user_id) {
                continue;
            }
            info!("[scheduler] starting worker for {user_id}");
            let worker = BatchWorker::new(user_id.clone(), self.services.clone());
            let cancelled = worker.cancel_handle();
            let join = tokio::spawn(worker.run_loop());
            workers.insert(user_id, WorkerHandle { join, cancelled });
        }

        Ok(())
    }

    async fn shutdown_all(&self) {
        let mut workers = self.workers.write().await;
        for (user_id, handle) in workers.drain() {
            handle.cancelled.store(true, Ordering::Relaxed);
            if let Err(e) = handle.join.await {
                if !e.is_cancelled() {
                    error!("[scheduler] worker for {user_id} panicked: {e}");
                }
            }
        }
        self.services.tracer.flush().await;
        info!("[scheduler] all workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_stores::memory::InMemoryObservabilityStore;
    use crate::llm::Analyzer;
    use crate::metrics_source::MetricsFetcher;
    use crate::models::{MetricSample, Target};
    use crate::services::test_support::test_services;
    use async_trait::async_trait;
    use tokio::time::Duration;

    struct NoMetrics;

    #[async_trait]
    impl MetricsFetcher for NoMetrics {
        async fn fetch_for_tenant(&self, _user_id: &str) -> Vec<MetricSample> {
            Vec::new()
        }
    }

    struct NoAnalysis;

    #[async_trait]
    impl Analyzer for NoAnalysis {
        async fn ask(
            &self,
            _prompt: &str,
            _trace_name: &str,
            _metadata: serde_json::Value,
            _session_id: &str,
        ) -> Option<(String, u64)> {
            None
        }
    }

    fn enabled_target(user_id: &str) -> Target {
        Target {
            user_id: user_id.to_string(),
            name: "primary".to_string(),
            endpoint: "http://localhost:9090".to_string(),
            labels: Default::default(),
            enabled: true,
        }
    }

    /// Reconciliation must spawn exactly one worker per tenant with at least
    /// one enabled target, leave tenants with none untouched, and is
    /// idempotent when called again with the same active set.
    #[tokio::test]
    async fn reconcile_starts_workers_only_for_active_tenants() {
        let store = Arc::new(InMemoryObservabilityStore::new());
        store.seed_target(enabled_target("alice"));
        let mut bob_target = enabled_target("bob");
        bob_target.enabled = false;
        store.seed_target(bob_target);

        let metrics: Arc<dyn MetricsFetcher> = Arc::new(NoMetrics);
        let llm: Arc<dyn Analyzer> = Arc::new(NoAnalysis);
        let services = test_services(store, metrics, llm);
        let scheduler = Scheduler::new(services);

        scheduler.reconcile().await.expect("reconcile should succeed");
        {
            let workers = scheduler.workers.read().await;
            assert!(workers.contains_key("alice"));
            assert!(!workers.contains_key("bob"));
            assert_eq!(workers.len(), 1);
        }

        scheduler.reconcile().await.expect("reconcile is idempotent while active");
        assert_eq!(scheduler.workers.read().await.len(), 1);
    }

    /// A tenant whose worker is no longer in the active set is torn down via
    /// cooperative cancellation: the flag is set and the handle is awaited,
    /// never `.abort()`ed.
    #[tokio::test(start_paused = true)]
    async fn reconcile_tears_down_workers_for_tenants_that_go_inactive() {
        let store = Arc::new(InMemoryObservabilityStore::new());
        let metrics: Arc<dyn MetricsFetcher> = Arc::new(NoMetrics);
        let llm: Arc<dyn Analyzer> = Arc::new(NoAnalysis);
        let services = test_services(store, metrics, llm);
        let scheduler = Scheduler::new(services.clone());

        // Plant a worker directly, bypassing reconcile, for a tenant the
        // store no longer reports as active.
        let worker = BatchWorker::new("alice".to_string(), services);
        let cancelled = worker.cancel_handle();
        let join = tokio::spawn(worker.run_loop());
        scheduler.workers.write().await.insert("alice".to_string(), WorkerHandle { join, cancelled });
        assert_eq!(scheduler.workers.read().await.len(), 1);

        // reconcile() awaits the worker's handle after flagging cancellation,
        // which only resolves once its sleep-to-next-bucket elapses. Drive
        // virtual time forward concurrently so the test doesn't wait on the
        // real clock.
        let reconcile_fut = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.reconcile().await })
        };
        tokio::time::advance(Duration::from_secs(130)).await;
        reconcile_fut.await.expect("task should not panic").expect("reconcile should succeed");

        assert!(scheduler.workers.read().await.is_empty());
    }
}
