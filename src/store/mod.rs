// src/store/mod.rs
pub mod dynamo;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{error, info, warn};

use crate::error::PersistError;
use crate::ingest::types::{CycleResult, Source, TrendRecord};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// Keyed snapshot store: one row per source, last write wins.
///
/// Implementations must be safe to call concurrently; a cycle upserts all of its
/// records at once.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn upsert(&self, record: &TrendRecord) -> Result<(), PersistError>;

    /// Short label for logs.
    fn backend(&self) -> &'static str;
}

/// What happened to each successful record of a cycle.
#[derive(Debug, Default)]
pub struct PersistReport {
    pub written: Vec<Source>,
    pub failed: Vec<(Source, PersistError)>,
}

impl PersistReport {
    pub fn fatal_count(&self) -> usize {
        self.failed.iter().filter(|(_, e)| e.is_fatal()).count()
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("trend_persist_total", "Snapshots written to the store.");
        describe_counter!(
            "trend_persist_failures_total",
            "Snapshot writes that failed, by kind."
        );
    });
}

/// Upsert every success of `cycle` independently. A failed write is logged and
/// counted; it never stops the remaining writes.
///
/// Each write gets at most `deadline`. A store that never answers is reported as
/// `Transient` so the cycle still completes.
pub async fn persist_cycle(
    store: &dyn SnapshotStore,
    cycle: &CycleResult,
    deadline: Duration,
) -> PersistReport {
    ensure_metrics_described();

    let results = join_all(cycle.successes.iter().map(|rec| async move {
        let res = match tokio::time::timeout(deadline, store.upsert(rec)).await {
            Ok(res) => res,
            Err(_) => Err(PersistError::Transient(format!(
                "no acknowledgement within {}ms",
                deadline.as_millis()
            ))),
        };
        (rec.source, res)
    }))
    .await;

    let mut report = PersistReport::default();
    for (source, res) in results {
        match res {
            Ok(()) => {
                counter!("trend_persist_total", "source" => source.as_str()).increment(1);
                info!(target: "store", source = source.as_str(), backend = store.backend(), "snapshot upserted");
                report.written.push(source);
            }
            Err(e) => {
                counter!(
                    "trend_persist_failures_total",
                    "source" => source.as_str(),
                    "kind" => e.kind_str()
                )
                .increment(1);
                if e.is_fatal() {
                    error!(target: "store", source = source.as_str(), backend = store.backend(), error = %e, "snapshot write failed");
                } else {
                    warn!(target: "store", source = source.as_str(), backend = store.backend(), error = %e, "snapshot write failed, next cycle will retry");
                }
                report.failed.push((source, e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{FetchOutcome, TrendItem};
    use serde_json::json;

    /// Fails writes for one source, delegates the rest.
    struct FlakyStore {
        inner: MemoryStore,
        broken: Source,
        err: PersistError,
    }

    #[async_trait]
    impl SnapshotStore for FlakyStore {
        async fn upsert(&self, record: &TrendRecord) -> Result<(), PersistError> {
            if record.source == self.broken {
                return Err(self.err.clone());
            }
            self.inner.upsert(record).await
        }
        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    fn items(v: serde_json::Value) -> Vec<TrendItem> {
        serde_json::from_value(v).unwrap()
    }

    #[tokio::test]
    async fn one_failed_write_does_not_block_the_others() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            broken: Source::Github,
            err: PersistError::Fatal("table missing".into()),
        };
        let mut cycle = CycleResult::default();
        cycle.push(FetchOutcome::Success(TrendRecord::new(Source::Github, vec![])));
        cycle.push(FetchOutcome::Success(TrendRecord::new(
            Source::Wikipedia,
            items(json!([{"title": "A"}])),
        )));
        cycle.push(FetchOutcome::Success(TrendRecord::new(Source::Hackernews, vec![])));

        let report = persist_cycle(&store, &cycle, Duration::from_secs(5)).await;
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.fatal_count(), 1);
        assert!(store.inner.get(Source::Wikipedia).is_some());
        assert!(store.inner.get(Source::Github).is_none());
    }

    #[tokio::test]
    async fn failures_in_the_cycle_are_not_written() {
        let store = MemoryStore::new();
        let mut cycle = CycleResult::default();
        cycle.push(FetchOutcome::failure(
            Source::Tiktok,
            crate::error::ErrorKind::Network,
            "reset",
        ));
        let report = persist_cycle(&store, &cycle, Duration::from_secs(5)).await;
        assert!(report.written.is_empty());
        assert!(report.failed.is_empty());
        assert!(store.is_empty());
    }

    struct SilentStore;

    #[async_trait]
    impl SnapshotStore for SilentStore {
        async fn upsert(&self, _record: &TrendRecord) -> Result<(), PersistError> {
            std::future::pending().await
        }
        fn backend(&self) -> &'static str {
            "silent"
        }
    }

    #[tokio::test]
    async fn unanswered_write_is_transient_after_deadline() {
        let mut cycle = CycleResult::default();
        cycle.push(FetchOutcome::Success(TrendRecord::new(Source::Youtube, vec![])));

        let started = std::time::Instant::now();
        let report = persist_cycle(&SilentStore, &cycle, Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(report.written.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, PersistError::Transient(_)));
    }
}
