//! Storage module.
//!
//! Snapshot records, the persistence seam and aggregate queries.
//! Durable storage is the host's concern; [`MemoryStore`] backs tests and
//! single-process deployments.

pub mod models;
pub mod stats;
pub mod store;

pub use models::*;
pub use stats::{compute as compute_stats, CategoryCount, IncidentStats};
pub use store::{IncidentStore, MemoryStore, StoreError};
