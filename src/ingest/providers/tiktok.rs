// src/ingest/providers/tiktok.rs
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::FetchError;
use crate::ingest::http::{get_text, BROWSER_USER_AGENT};
use crate::ingest::types::{FetchOutcome, Fetcher, Source, TrendItem};
use crate::ingest::{clean_text, to_item};

pub const DEFAULT_BASE_URL: &str = "https://ads.tiktok.com";
const PAGE_PATH: &str = "/business/creativecenter/inspiration/popular/hashtag/pc/en";
const LIMIT: usize = 10;

/// Popular hashtags from the Creative Center page (Next.js hydration payload).
pub struct TiktokFetcher {
    client: Client,
    base_url: String,
}

impl TiktokFetcher {
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
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), PAGE_PATH);
        let req = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT);
        let html = get_text(req).await?;
        parse_hashtag_page(&html)
    }
}

#[async_trait]
impl Fetcher for TiktokFetcher {
    fn source(&self) -> Source {
        Source::Tiktok
    }

    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.source(), self.collect().await)
    }
}

pub(crate) fn parse_hashtag_page(html: &str) -> Result<Vec<TrendItem>, FetchError> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#)
            .expect("static regex")
    });
    let blob = re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| FetchError::parse("__NEXT_DATA__ script not found"))?;
    let data: Value = serde_json::from_str(blob.as_str())?;

    let state = data
        .pointer("/props/pageProps/dehydratedState")
        .ok_or_else(|| FetchError::parse("missing props.pageProps.dehydratedState"))?;

    let mut out = Vec::new();
    let queries = state
        .get("queries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for q in queries {
        let Some(d) = q.pointer("/state/data") else {
            continue;
        };
        // Paged queries keep their rows under the first page.
        let target = match d.get("pages").and_then(Value::as_array) {
            Some(pages) => match pages.first() {
                Some(first) => first,
                None => continue,
            },
            None => d,
        };
        let Some(list) = target.get("list").and_then(Value::as_array) else {
            continue;
        };
        for entry in list.iter().take(LIMIT) {
            let Some(name) = entry.get("hashtagName").and_then(Value::as_str) else {
                continue;
            };
            out.push(to_item(json!({
                "name": clean_text(name),
                "views": entry.get("videoViews").cloned().unwrap_or(json!(0)),
                "rank": entry.get("rank").cloned().unwrap_or(Value::Null),
            })));
        }
    }
    Ok(out)
}
