// src/ingest/providers/wikipedia.rs
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::FetchError;
use crate::ingest::http::get_json;
use crate::ingest::to_item;
use crate::ingest::types::{FetchOutcome, Fetcher, Source, TrendItem};

pub const DEFAULT_BASE_URL: &str = "https://wikimedia.org";
const LIMIT: usize = 10;

/// Most-viewed English Wikipedia articles for the previous (UTC) day.
pub struct WikipediaFetcher {
    client: Client,
    base_url: String,
}

impl WikipediaFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, day: NaiveDate) -> String {
        format!(
            "{}/api/rest_v1/metrics/pageviews/top/en.wikipedia/all-access/{}",
            self.base_url.trim_end_matches('/'),
            day.format("%Y/%m/%d")
        )
    }

    async fn collect(&self) -> Result<Vec<TrendItem>, FetchError> {
        let today = Utc::now().date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let body = get_json(self.client.get(self.url_for(yesterday))).await?;
        parse_top_articles(&body)
    }
}

#[async_trait]
impl Fetcher for WikipediaFetcher {
    fn source(&self) -> Source {
        Source::Wikipedia
    }

    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.source(), self.collect().await)
    }
}

pub(crate) fn parse_top_articles(body: &Value) -> Result<Vec<TrendItem>, FetchError> {
    let articles = body
        .pointer("/items/0/articles")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::parse("missing items[0].articles"))?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(LIMIT);
    for a in articles {
        let title = a
            .get("article")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::parse("article entry without a title"))?;
        if title.contains("Special:") || title.contains("Main_Page") || !seen.insert(title) {
            continue;
        }
        out.push(to_item(json!({
            "title": title.replace('_', " "),
            "views": a.get("views").cloned().unwrap_or(json!(0)),
        })));
        if out.len() >= LIMIT {
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn skips_special_pages_and_duplicates() {
        let body = json!({"items": [{"articles": [
            {"article": "Main_Page", "views": 9_000_000},
            {"article": "Special:Search", "views": 800_000},
            {"article": "Rust_(programming_language)", "views": 500},
            {"article": "Rust_(programming_language)", "views": 499},
            {"article": "Ferris", "views": 10}
        ]}]});
        let items = parse_top_articles(&body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["title"], "Rust (programming language)");
        assert_eq!(items[0]["views"], 500);
        assert_eq!(items[1]["title"], "Ferris");
    }

    #[test]
    fn stops_after_ten_articles() {
        let articles: Vec<Value> = (0..40)
            .map(|i| json!({"article": format!("A{i}"), "views": 40 - i}))
            .collect();
        let body = json!({"items": [{"articles": articles}]});
        assert_eq!(parse_top_articles(&body).unwrap().len(), 10);
    }

    #[test]
    fn unexpected_shape_is_a_parse_error() {
        let err = parse_top_articles(&json!({"detail": "nope"})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn url_uses_slash_separated_date() {
        let f = WikipediaFetcher::with_base_url(Client::new(), "http://localhost:1/");
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            f.url_for(day),
            "http://localhost:1/api/rest_v1/metrics/pageviews/top/en.wikipedia/all-access/2024/03/07"
        );
    }
}
