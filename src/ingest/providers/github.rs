// src/ingest/providers/github.rs
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::FetchError;
use crate::ingest::http::get_json;
use crate::ingest::to_item;
use crate::ingest::types::{FetchOutcome, Fetcher, Source, TrendItem};

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
const LIMIT: usize = 10;

/// Most-starred repositories created in the last seven days.
pub struct GithubFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubFetcher {
    pub fn new(client: Client, token: Option<String>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }

    async fn collect(&self) -> Result<Vec<TrendItem>, FetchError> {
        let today = Utc::now().date_naive();
        let since = today.checked_sub_days(Days::new(7)).unwrap_or(today);

        let mut req = self
            .client
            .get(format!(
                "{}/search/repositories",
                self.base_url.trim_end_matches('/')
            ))
            .query(&[
                ("q", search_query(since).as_str()),
                ("sort", "stars"),
                ("order", "desc"),
            ])
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let body = get_json(req).await?;
        parse_search(&body)
    }
}

#[async_trait]
impl Fetcher for GithubFetcher {
    fn source(&self) -> Source {
        Source::Github
    }

    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.source(), self.collect().await)
    }
}

fn search_query(since: NaiveDate) -> String {
    format!("created:>{}", since.format("%Y-%m-%d"))
}

pub(crate) fn parse_search(body: &Value) -> Result<Vec<TrendItem>, FetchError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::parse("search response without items"))?;

    let field = |it: &Value, k: &str| it.get(k).cloned().unwrap_or(Value::Null);
    Ok(items
        .iter()
        .take(LIMIT)
        .map(|it| {
            to_item(json!({
                "name": field(it, "full_name"),
                "stars": field(it, "stargazers_count"),
                "description": field(it, "description"),
                "url": field(it, "html_url"),
            }))
        })
        .collect())
}
