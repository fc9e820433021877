// src/ingest/mod.rs
pub mod http;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::ingest::types::{CycleResult, FetchOutcome, Fetcher, Source, TrendItem};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "trend_fetch_success_total",
            "Fetcher invocations that produced a record."
        );
        describe_counter!(
            "trend_fetch_failures_total",
            "Fetcher invocations that failed, by kind."
        );
        describe_counter!(
            "trend_items_fetched_total",
            "Trend items contained in successful records."
        );
        describe_histogram!(
            "trend_fetch_duration_ms",
            "Wall time of one fetcher invocation in milliseconds."
        );
    });
}

/// Clean scraped text: decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let decoded = html_escape::decode_html_entities(s);

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let stripped = re_tags.replace_all(&decoded, "");

    // 3) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    let mut out = re_ws.replace_all(&stripped, " ").trim().to_string();

    // 4) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

/// Wrap a JSON value as a trend item. Non-objects land under `value`.
pub fn to_item(v: serde_json::Value) -> TrendItem {
    match v {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = TrendItem::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Runs the registered fetchers for one cycle.
///
/// Every fetcher is invoked exactly once per [`Aggregator::run_cycle`], all of them
/// concurrently. Each invocation is bounded by `deadline`, independent of whatever
/// timeouts the fetcher applies itself; on expiry the in-flight future is dropped and
/// the source is reported as `Unavailable`.
pub struct Aggregator {
    fetchers: Vec<Arc<dyn Fetcher>>,
    deadline: Duration,
}

impl Aggregator {
    pub fn new(fetchers: Vec<Arc<dyn Fetcher>>, deadline: Duration) -> Self {
        Self { fetchers, deadline }
    }

    pub fn sources(&self) -> Vec<Source> {
        self.fetchers.iter().map(|f| f.source()).collect()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Never fails: the result always accounts for every registered source.
    pub async fn run_cycle(&self) -> CycleResult {
        ensure_metrics_described();

        let mut pending: FuturesUnordered<_> = self
            .fetchers
            .iter()
            .map(|f| run_guarded(f.as_ref(), self.deadline))
            .collect();

        let mut cycle = CycleResult::default();
        while let Some(outcome) = pending.next().await {
            match &outcome {
                FetchOutcome::Success(rec) => {
                    let source = rec.source.as_str();
                    counter!("trend_fetch_success_total", "source" => source).increment(1);
                    counter!("trend_items_fetched_total", "source" => source)
                        .increment(rec.items.len() as u64);
                    info!(target: "ingest", source, items = rec.items.len(), "fetched");
                }
                FetchOutcome::Failure(f) => {
                    counter!(
                        "trend_fetch_failures_total",
                        "source" => f.source.as_str(),
                        "kind" => f.kind.as_str()
                    )
                    .increment(1);
                    warn!(
                        target: "ingest",
                        source = f.source.as_str(),
                        kind = f.kind.as_str(),
                        error = %f.message,
                        "fetch failed"
                    );
                }
            }
            cycle.push(outcome);
        }
        cycle
    }
}

async fn run_guarded(fetcher: &dyn Fetcher, deadline: Duration) -> FetchOutcome {
    let source = fetcher.source();
    let t0 = Instant::now();

    let guarded = AssertUnwindSafe(fetcher.fetch()).catch_unwind();
    let outcome = match tokio::time::timeout(deadline, guarded).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => FetchOutcome::failure(source, ErrorKind::Unavailable, "fetcher panicked"),
        Err(_) => FetchOutcome::failure(
            source,
            ErrorKind::Unavailable,
            format!("no result within {}ms deadline", deadline.as_millis()),
        ),
    };

    histogram!("trend_fetch_duration_ms", "source" => source.as_str())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);
    outcome
}
