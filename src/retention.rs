//! Retention janitor: keeps the append-only collections capped and evicts
//! idle chat sessions, on a single periodic sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info};

use crate::services::Services;

pub struct Retention {
    services: Arc<Services>,
}

impl Retention {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub async fn run(self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let interval = self.services.config.scheduler.retention_sweep_interval_secs;
        loop {
            if let Err(e) = self.sweep().await {
                error!("[retention] sweep failed: {e}");
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                _ = &mut shutdown => {
                    info!("[retention] shutdown requested");
                    break;
                }
            }
        }
    }

    async fn sweep(&self) -> anyhow::Result<()> {
        let cap = self.services.config.store.max_documents_per_collection as usize;
        let tenants = self.services.store.list_active_tenants().await?;

        for user_id in &tenants {
            if let Err(e) = self.services.store.enforce_retention(user_id, cap).await {
                error!("[retention] enforce_retention failed for {user_id}: {e}");
            }
        }

        let max_age_hours = self.services.config.scheduler.chat_session_max_age_hours;
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        match self.services.store.evict_inactive_sessions(cutoff).await {
            Ok(evicted) if evicted > 0 => info!("[retention] evicted {evicted} idle chat sessions"),
            Ok(_) => {}
            Err(e) => error!("[retention] evict_inactive_sessions failed: {e}"),
        }

        info!("[retention] sweep complete for {} tenants", tenants.len());
        Ok(())
    }
}
