//! Typed, env-sourced process configuration.
//!
//! One substructure per concern, following the central configuration
//! convention of this crate's lineage. Every field has a documented default
//! except the store URL, the LLM credentials, and the SMTP credentials,
//! which fail loading outright when absent — the service cannot do useful
//! work without them.

use std::env;

use crate::errors::ConfigError;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

#[derive(Debug, Clone)]
pub struct MetricsSourceConfig {
    pub url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub primary_api_key: String,
    pub primary_model: String,
    pub secondary_url: String,
    pub secondary_model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub database_name: String,
    pub max_documents_per_collection: u64,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub interval_minutes: i64,
    pub max_metrics: usize,
    pub max_metrics_per_instance: usize,
}

#[derive(Debug, Clone)]
pub struct NotificationsConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub enabled: bool,
    pub public_key: String,
    pub secret_key: String,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub reconciliation_interval_secs: u64,
    pub retention_sweep_interval_secs: u64,
    pub chat_session_max_age_hours: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub metrics_source: MetricsSourceConfig,
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub batch: BatchConfig,
    pub notifications: NotificationsConfig,
    pub tracing: TracingConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from the environment, matching the deployment's
    /// existing env-var catalogue (`PROM_URL`, `MONGO_URI`, `LLM_URL`, ...).
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_url = env_required("MONGO_URI")?;
        let primary_api_key = env_required("OPENAI_API_KEY")?;
        let smtp_username = env_required("SMTP_USER")?;
        let smtp_password = env_required("SMTP_PASSWORD")?;

        Ok(Self {
            metrics_source: MetricsSourceConfig {
                url: env_or("PROM_URL", "http://localhost:9090"),
                request_timeout_secs: env_parsed("PROM_TIMEOUT_SECS", 30),
            },
            llm: LlmConfig {
                primary_api_key,
                primary_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
                secondary_url: env_or("LLM_URL", "http://localhost:11434"),
                secondary_model: env_or("LLM_MODEL", "gemma3:1b"),
                timeout_secs: env_parsed("LLM_TIMEOUT_SECS", 120),
                temperature: env_parsed("LLM_TEMPERATURE", 0.2),
            },
            store: StoreConfig {
                url: store_url,
                database_name: env_or("MONGO_DB", "observability"),
                max_documents_per_collection: env_parsed("MAX_DOCS", 1000),
            },
            batch: BatchConfig {
                interval_minutes: env_parsed("BATCH_INTERVAL_MINUTES", 2),
                max_metrics: env_parsed("BATCH_MAX_METRICS", 600),
                max_metrics_per_instance: env_parsed("BATCH_METRICS_PER_INSTANCE", 200),
            },
            notifications: NotificationsConfig {
                smtp_host: env_or("SMTP_HOST", "smtp.gmail.com"),
                smtp_port: env_parsed("SMTP_PORT", 587),
                smtp_username: smtp_username.clone(),
                smtp_password,
                from_address: env_or("SMTP_FROM", &smtp_username),
            },
            tracing: TracingConfig {
                enabled: env_parsed("TRACING_ENABLED", false),
                public_key: env_or("LANGFUSE_PUBLIC_KEY", ""),
                secret_key: env_or("LANGFUSE_SECRET_KEY", ""),
                host: env_or("LANGFUSE_HOST", "https://cloud.langfuse.com"),
            },
            scheduler: SchedulerConfig {
                reconciliation_interval_secs: env_parsed("SCHEDULER_INTERVAL_SECS", 300),
                retention_sweep_interval_secs: env_parsed("RETENTION_INTERVAL_SECS", 3600),
                chat_session_max_age_hours: env_parsed("CHAT_SESSION_MAX_AGE_HOURS", 720),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable access is process-global; serialize config tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set(key: &str, value: &str) {
        env::set_var(key, value);
    }

    fn clear_all() {
        for key in [
            "MONGO_URI", "OPENAI_API_KEY", "SMTP_USER", "SMTP_PASSWORD",
            "PROM_URL", "OPENAI_MODEL", "LLM_URL", "LLM_MODEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_store_url_fails_to_load() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set("OPENAI_API_KEY", "k");
        set("SMTP_USER", "u");
        set("SMTP_PASSWORD", "p");
        assert!(Config::from_env().is_err());
        clear_all();
    }

    #[test]
    fn fully_specified_env_loads_with_defaults_for_the_rest() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set("MONGO_URI", "mongodb://localhost:27017");
        set("OPENAI_API_KEY", "k");
        set("SMTP_USER", "u@example.com");
        set("SMTP_PASSWORD", "p");
        let cfg = Config::from_env().expect("config should load");
        assert_eq!(cfg.metrics_source.url, "http://localhost:9090");
        assert_eq!(cfg.batch.interval_minutes, 2);
        assert_eq!(cfg.llm.primary_model, "gpt-4o-mini");
        clear_all();
    }
}
