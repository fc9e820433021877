// src/ingest/providers/hackernews.rs
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::FetchError;
use crate::ingest::http::get_json;
use crate::ingest::to_item;
use crate::ingest::types::{FetchOutcome, Fetcher, Source, TrendItem};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com";
const LIMIT: usize = 10;

/// Front-page stories from the Hacker News Firebase API.
pub struct HackernewsFetcher {
    client: Client,
    base_url: String,
}

impl HackernewsFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn collect(&self) -> Result<Vec<TrendItem>, FetchError> {
        let base = self.base_url.trim_end_matches('/');
        let ids = get_json(self.client.get(format!("{base}/v0/topstories.json"))).await?;
        let ids = top_ids(&ids)?;

        // Story lookups run concurrently; output keeps front-page order.
        let stories = try_join_all(ids.iter().map(|id| {
            let req = self.client.get(format!("{base}/v0/item/{id}.json"));
            async move { get_json(req).await.map(|v| (*id, v)) }
        }))
        .await?;

        Ok(stories
            .iter()
            .filter_map(|(id, v)| story_item(*id, v))
            .collect())
    }
}

#[async_trait]
impl Fetcher for HackernewsFetcher {
    fn source(&self) -> Source {
        Source::Hackernews
    }

    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.source(), self.collect().await)
    }
}

fn top_ids(v: &Value) -> Result<Vec<u64>, FetchError> {
    let arr = v
        .as_array()
        .ok_or_else(|| FetchError::parse("topstories is not an array"))?;
    Ok(arr.iter().filter_map(Value::as_u64).take(LIMIT).collect())
}

/// Deleted or dead stories come back as `null` and are skipped.
fn story_item(id: u64, v: &Value) -> Option<TrendItem> {
    if !v.is_object() {
        return None;
    }
    let url = v
        .get("url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={id}"));
    Some(to_item(json!({
        "title": v.get("title").cloned().unwrap_or(Value::Null),
        "score": v.get("score").cloned().unwrap_or(Value::Null),
        "url": url,
    })))
}
