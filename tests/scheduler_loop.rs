// tests/scheduler_loop.rs
//
// Scheduler behaviour: immediate first tick, serialized cycles, last-write-wins,
// clean shutdown, and a silent store not wedging the loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::watch;

use trend_aggregator::ingest::types::TrendItem;
use trend_aggregator::store::{MemoryStore, SnapshotStore};
use trend_aggregator::{
    Aggregator, FetchOutcome, Fetcher, PersistError, Scheduler, Source, TrendRecord,
};

/// Returns `[{"cycle": n}]` on its n-th call, after `delay`. Tracks overlap.
struct CountingFetcher {
    source: Source,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CountingFetcher {
    fn new(source: Source, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            source,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self) -> FetchOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let items: Vec<TrendItem> = serde_json::from_value(json!([{ "cycle": n }])).unwrap();
        FetchOutcome::Success(TrendRecord::new(self.source, items))
    }
}

async fn wait_for_cycles(status: &trend_aggregator::ingest::scheduler::CycleStatus, n: u64) {
    for _ in 0..500 {
        if status.cycles_completed() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scheduler did not reach {n} cycles");
}

#[tokio::test]
async fn first_tick_runs_immediately() {
    let f = CountingFetcher::new(Source::Github, Duration::ZERO);
    let store = Arc::new(MemoryStore::new());
    // An hour-long interval: only the startup tick can run within this test.
    let scheduler = Scheduler::new(
        Aggregator::new(vec![f.clone() as Arc<dyn Fetcher>], Duration::from_secs(5)),
        store.clone(),
        Duration::from_secs(3600),
    );
    let status = scheduler.status();
    let (tx, rx) = watch::channel(false);
    let handle = scheduler.spawn(rx);

    wait_for_cycles(&status, 1).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(status.cycles_completed(), 1);
    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    assert!(store.get(Source::Github).is_some());
}

#[tokio::test]
async fn overrunning_cycles_never_overlap() {
    // Each cycle takes longer than the interval.
    let f = CountingFetcher::new(Source::Hackernews, Duration::from_millis(40));
    let store = Arc::new(MemoryStore::new());
    let scheduler = Scheduler::new(
        Aggregator::new(vec![f.clone() as Arc<dyn Fetcher>], Duration::from_secs(5)),
        store,
        Duration::from_millis(5),
    );
    let status = scheduler.status();
    let (tx, rx) = watch::channel(false);
    let handle = scheduler.spawn(rx);

    wait_for_cycles(&status, 4).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(f.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(
        f.calls.load(Ordering::SeqCst) as u64,
        status.cycles_completed(),
        "one invocation per cycle"
    );
}

#[tokio::test]
async fn store_keeps_only_the_latest_cycle() {
    let f = CountingFetcher::new(Source::Wikipedia, Duration::ZERO);
    let store = Arc::new(MemoryStore::new());
    let scheduler = Scheduler::new(
        Aggregator::new(vec![f.clone() as Arc<dyn Fetcher>], Duration::from_secs(5)),
        store.clone(),
        Duration::from_millis(10),
    );

    // Drive two ticks by hand.
    scheduler.run_tick().await;
    scheduler.run_tick().await;

    assert_eq!(store.len(), 1);
    let row = store.get(Source::Wikipedia).unwrap();
    assert_eq!(row.items.len(), 1);
    assert_eq!(row.items[0]["cycle"], 2);
}

#[tokio::test]
async fn shutdown_lets_the_in_flight_cycle_finish() {
    let f = CountingFetcher::new(Source::Tiktok, Duration::from_millis(200));
    let store = Arc::new(MemoryStore::new());
    let scheduler = Scheduler::new(
        Aggregator::new(vec![f.clone() as Arc<dyn Fetcher>], Duration::from_secs(5)),
        store.clone(),
        Duration::from_millis(10),
    );
    let status = scheduler.status();
    let (tx, rx) = watch::channel(false);
    let handle = scheduler.spawn(rx);

    // Wait until the first cycle is mid-flight, then ask to stop.
    for _ in 0..100 {
        if status.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler stops promptly")
        .unwrap();

    assert_eq!(status.cycles_completed(), 1);
    assert!(!status.is_running());
    assert!(store.get(Source::Tiktok).is_some(), "in-flight cycle was persisted");
}

/// Accepts writes and never answers.
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
async fn silent_store_does_not_stall_cycles_or_shutdown() {
    let f = CountingFetcher::new(Source::Youtube, Duration::ZERO);
    let scheduler = Scheduler::new(
        Aggregator::new(vec![f.clone() as Arc<dyn Fetcher>], Duration::from_secs(5)),
        Arc::new(SilentStore),
        Duration::from_millis(100),
    )
    .with_write_deadline(Duration::from_millis(200));
    let status = scheduler.status();
    let (tx, rx) = watch::channel(false);
    let handle = scheduler.spawn(rx);

    wait_for_cycles(&status, 2).await;
    assert_eq!(status.snapshot().last_successes, 1);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler stops promptly")
        .unwrap();
    assert!(!status.is_running());
}
