//! Persistence layer: a storage-agnostic trait surface, a MongoDB-backed
//! implementation, and an in-memory implementation for tests and
//! non-durable deployments.

pub mod memory;
#[cfg(feature = "mongodb-store")]
pub mod mongo;
pub mod traits;

pub use traits::*;
