// src/lib.rs
// Public library surface for the worker binary, the operator bins and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::error::{ErrorKind, FetchError, PersistError, StartupError};
pub use crate::ingest::scheduler::Scheduler;
pub use crate::ingest::types::{CycleResult, FetchOutcome, Fetcher, Source, TrendRecord};
pub use crate::ingest::Aggregator;
pub use crate::store::SnapshotStore;
