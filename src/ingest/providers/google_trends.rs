// src/ingest/providers/google_trends.rs
use async_trait::async_trait;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::FetchError;
use crate::ingest::http::get_text;
use crate::ingest::types::{FetchOutcome, Fetcher, Source, TrendItem};
use crate::ingest::{clean_text, to_item};

pub const DEFAULT_BASE_URL: &str = "https://trends.google.com";
const LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
}

/// Daily trending searches for one region, from the public RSS feed.
pub struct GoogleTrendsFetcher {
    client: Client,
    base_url: String,
    geo: String,
}

impl GoogleTrendsFetcher {
    pub fn new(client: Client, geo: impl Into<String>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL, geo)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>, geo: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            geo: geo.into(),
        }
    }

    async fn collect(&self) -> Result<Vec<TrendItem>, FetchError> {
        let req = self
            .client
            .get(format!(
                "{}/trending/rss",
                self.base_url.trim_end_matches('/')
            ))
            .query(&[("geo", self.geo.as_str())]);
        let xml = get_text(req).await?;
        parse_feed(&xml)
    }
}

#[async_trait]
impl Fetcher for GoogleTrendsFetcher {
    fn source(&self) -> Source {
        Source::GoogleTrends
    }

    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.source(), self.collect().await)
    }
}

pub(crate) fn parse_feed(xml: &str) -> Result<Vec<TrendItem>, FetchError> {
    let rss: Rss =
        from_str(xml).map_err(|e| FetchError::parse(format!("parsing trends rss: {e}")))?;

    Ok(rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| it.title)
        .map(|t| clean_text(&t))
        .filter(|t| !t.is_empty())
        .take(LIMIT)
        .map(|name| to_item(json!({ "name": name })))
        .collect())
}
