// src/ingest/types.rs
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ErrorKind, FetchError};

/// The fixed set of trend sources. The string form is the store's partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Youtube,
    Tiktok,
    Wikipedia,
    Hackernews,
    Github,
    GoogleTrends,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Youtube,
        Source::Tiktok,
        Source::Wikipedia,
        Source::Hackernews,
        Source::Github,
        Source::GoogleTrends,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Youtube => "youtube",
            Source::Tiktok => "tiktok",
            Source::Wikipedia => "wikipedia",
            Source::Hackernews => "hackernews",
            Source::Github => "github",
            Source::GoogleTrends => "google_trends",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trend entry. Shape is source-defined and opaque to the pipeline.
pub type TrendItem = serde_json::Map<String, serde_json::Value>;

/// A normalized snapshot of one source. `items` may be empty: the source answered
/// but had nothing trending, which is not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRecord {
    pub source: Source,
    pub items: Vec<TrendItem>,
    pub fetched_at: DateTime<Utc>,
}

impl TrendRecord {
    pub fn new(source: Source, items: Vec<TrendItem>) -> Self {
        Self {
            source,
            items,
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub source: Source,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(TrendRecord),
    Failure(FetchFailure),
}

impl FetchOutcome {
    /// Fold a provider's internal result into the outcome the aggregator consumes.
    pub fn from_result(source: Source, res: Result<Vec<TrendItem>, FetchError>) -> Self {
        match res {
            Ok(items) => FetchOutcome::Success(TrendRecord::new(source, items)),
            Err(e) => FetchOutcome::failure(source, e.kind, e.message),
        }
    }

    pub fn failure(source: Source, kind: ErrorKind, message: impl Into<String>) -> Self {
        FetchOutcome::Failure(FetchFailure {
            source,
            kind,
            message: message.into(),
        })
    }
}

/// Everything one tick produced. Successes are in arrival order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleResult {
    pub successes: Vec<TrendRecord>,
    pub failures: Vec<FetchFailure>,
}

impl CycleResult {
    pub fn push(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success(r) => self.successes.push(r),
            FetchOutcome::Failure(f) => self.failures.push(f),
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// A trend source, pre-bound to its endpoint.
///
/// Implementations must enforce their own per-request timeouts and must always
/// return an outcome; errors are reported as `FetchOutcome::Failure`, never raised.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn source(&self) -> Source;
    async fn fetch(&self) -> FetchOutcome;
}
