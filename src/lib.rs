//! Multi-tenant AI-assisted metrics analysis daemon.
//!
//! Per tenant, on a fixed interval, pulls a window of metrics from a
//! Prometheus-compatible backend, asks an LLM to analyse it, attributes the
//! result to a primary instance, persists it, and fans out notifications.

pub mod attribution;
pub mod batch_worker;
pub mod config;
pub mod data_stores;
pub mod errors;
pub mod http;
pub mod llm;
pub mod metrics_source;
pub mod models;
pub mod notifier;
pub mod parser;
pub mod retention;
pub mod scheduler;
pub mod services;
pub mod time;

pub use config::Config;
pub use models::*;
pub use scheduler::Scheduler;
pub use services::Services;
