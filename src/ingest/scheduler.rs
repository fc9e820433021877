// src/ingest/scheduler.rs
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::types::CycleResult;
use crate::ingest::Aggregator;
use crate::store::{persist_cycle, PersistReport, SnapshotStore};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("trend_cycles_total", "Completed fetch+persist cycles.");
        describe_histogram!(
            "trend_cycle_duration_ms",
            "Wall time of one cycle in milliseconds."
        );
        describe_gauge!("trend_last_cycle_ts", "Unix ts when the last cycle finished.");
        describe_gauge!("trend_cycle_running", "1 while a cycle is in flight.");
    });
}

/// Read-only view of the scheduler for the status endpoint. Only atomics are shared.
#[derive(Debug, Default)]
pub struct CycleStatus {
    running: AtomicBool,
    cycles_completed: AtomicU64,
    last_cycle_unix: AtomicU64,
    last_successes: AtomicUsize,
    last_failures: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub cycles_completed: u64,
    pub last_cycle_unix: Option<u64>,
    pub last_successes: usize,
    pub last_failures: usize,
}

impl CycleStatus {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let last = self.last_cycle_unix.load(Ordering::Acquire);
        StatusSnapshot {
            running: self.is_running(),
            cycles_completed: self.cycles_completed(),
            last_cycle_unix: (last > 0).then_some(last),
            last_successes: self.last_successes.load(Ordering::Acquire),
            last_failures: self.last_failures.load(Ordering::Acquire),
        }
    }

    fn begin(&self) {
        self.running.store(true, Ordering::Release);
        gauge!("trend_cycle_running").set(1.0);
    }

    fn finish(&self, cycle: &CycleResult) {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.last_successes
            .store(cycle.successes.len(), Ordering::Release);
        self.last_failures.store(cycle.failures.len(), Ordering::Release);
        self.last_cycle_unix.store(now, Ordering::Release);
        self.cycles_completed.fetch_add(1, Ordering::AcqRel);
        self.running.store(false, Ordering::Release);
        gauge!("trend_cycle_running").set(0.0);
        gauge!("trend_last_cycle_ts").set(now as f64);
    }
}

/// Outcome of one tick; dropped once logged.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle: CycleResult,
    pub persist: PersistReport,
    pub elapsed: Duration,
}

/// Bound on one snapshot write when the store sets none tighter.
pub const DEFAULT_WRITE_DEADLINE: Duration = Duration::from_secs(60);

/// Idle/Running loop. Ticks are serialized: a cycle that overruns the interval
/// delays the next tick instead of overlapping with it.
pub struct Scheduler {
    aggregator: Aggregator,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
    write_deadline: Duration,
    status: Arc<CycleStatus>,
}

impl Scheduler {
    pub fn new(aggregator: Aggregator, store: Arc<dyn SnapshotStore>, interval: Duration) -> Self {
        Self {
            aggregator,
            store,
            interval,
            write_deadline: DEFAULT_WRITE_DEADLINE,
            status: Arc::new(CycleStatus::default()),
        }
    }

    pub fn with_write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = deadline;
        self
    }

    pub fn status(&self) -> Arc<CycleStatus> {
        Arc::clone(&self.status)
    }

    /// One fetch + persist pass. Individual source failures never abort it.
    pub async fn run_tick(&self) -> CycleReport {
        ensure_metrics_described();
        let t0 = Instant::now();
        self.status.begin();

        let cycle = self.aggregator.run_cycle().await;
        let persist = persist_cycle(self.store.as_ref(), &cycle, self.write_deadline).await;

        self.status.finish(&cycle);
        let elapsed = t0.elapsed();
        counter!("trend_cycles_total").increment(1);
        histogram!("trend_cycle_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);

        let failed: Vec<&str> = cycle.failures.iter().map(|f| f.source.as_str()).collect();
        tracing::info!(
            target: "scheduler",
            successes = cycle.successes.len(),
            failures = cycle.failures.len(),
            failed_sources = ?failed,
            persisted = persist.written.len(),
            persist_failed = persist.failed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "cycle complete"
        );
        if persist.fatal_count() > 0 {
            tracing::error!(
                target: "scheduler",
                fatal = persist.fatal_count(),
                backend = self.store.backend(),
                "store rejected writes; check table and credentials"
            );
        }

        CycleReport {
            cycle,
            persist,
            elapsed,
        }
    }

    /// Tick immediately, then every `interval`, until `shutdown` flips to `true`.
    /// A cycle already in flight when shutdown arrives is allowed to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            target: "scheduler",
            interval_secs = self.interval.as_secs_f64(),
            deadline_secs = self.aggregator.deadline().as_secs_f64(),
            sources = ?self.aggregator.sources(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            self.run_tick().await;
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
        }

        tracing::info!(
            target: "scheduler",
            cycles = self.status.cycles_completed(),
            "scheduler stopped"
        );
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Resolves once shutdown is signalled. A dropped sender can never signal, so it
/// parks forever instead of ending the loop.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let signalled = rx.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
