// src/ingest/providers/youtube.rs
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::FetchError;
use crate::ingest::http::get_text;
use crate::ingest::types::{FetchOutcome, Fetcher, Source, TrendItem};
use crate::ingest::{clean_text, to_item};

pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
const QUERY: &str = "trending";
const LIMIT: usize = 15;

/// Top results of a "trending" search, read from the page's embedded initial data.
pub struct YoutubeFetcher {
    client: Client,
    base_url: String,
}

impl YoutubeFetcher {
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
        let url = format!("{}/results", self.base_url.trim_end_matches('/'));
        let req = self
            .client
            .get(url)
            .query(&[("search_query", QUERY)])
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        let html = get_text(req).await?;
        parse_results_page(&html)
    }
}

#[async_trait]
impl Fetcher for YoutubeFetcher {
    fn source(&self) -> Source {
        Source::Youtube
    }

    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.source(), self.collect().await)
    }
}

pub(crate) fn parse_results_page(html: &str) -> Result<Vec<TrendItem>, FetchError> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)(?:var\s+ytInitialData|window\[.ytInitialData.\])\s*=\s*(\{.*?\});\s*</script>")
            .expect("static regex")
    });
    let blob = re
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| FetchError::parse("ytInitialData not found in results page"))?;
    let data: Value = serde_json::from_str(blob.as_str())?;

    let mut renderers = Vec::new();
    collect_video_renderers(&data, &mut renderers);

    let items = renderers
        .into_iter()
        .filter_map(video_item)
        .take(LIMIT)
        .collect();
    Ok(items)
}

fn collect_video_renderers<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
    match v {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "videoRenderer" {
                    out.push(child);
                } else {
                    collect_video_renderers(child, out);
                }
            }
        }
        Value::Array(arr) => {
            for child in arr {
                collect_video_renderers(child, out);
            }
        }
        _ => {}
    }
}

fn video_item(r: &Value) -> Option<TrendItem> {
    let id = r.get("videoId")?.as_str()?;
    let title = text_of(r.get("title")).unwrap_or_else(|| "Unknown".to_string());
    let channel = text_of(r.get("ownerText"))
        .or_else(|| text_of(r.get("longBylineText")))
        .unwrap_or_else(|| "Unknown".to_string());
    let views = text_of(r.get("viewCountText"))
        .map(|t| parse_view_count(&t))
        .unwrap_or(0);

    Some(to_item(json!({
        "title": title,
        "channel": channel,
        "views": views,
        "url": format!("https://www.youtube.com/watch?v={id}"),
    })))
}

/// YouTube text fields come either as `simpleText` or as a list of `runs`.
fn text_of(v: Option<&Value>) -> Option<String> {
    let v = v?;
    if let Some(s) = v.get("simpleText").and_then(Value::as_str) {
        return Some(clean_text(s));
    }
    let runs = v.get("runs")?.as_array()?;
    let joined: String = runs
        .iter()
        .filter_map(|r| r.get("text").and_then(Value::as_str))
        .collect();
    let out = clean_text(&joined);
    (!out.is_empty()).then_some(out)
}

/// "1,234,567 views" -> 1234567. Abbreviated counts ("1.2M views") are not expanded.
fn parse_view_count(s: &str) -> u64 {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(initial: &Value) -> String {
        format!(
            "<html><script nonce=\"x\">var ytInitialData = {};</script><script>var other = 1;</script></html>",
            initial
        )
    }

    #[test]
    fn extracts_video_renderers_in_page_order() {
        let data = json!({
            "contents": {"sectionListRenderer": {"contents": [{"itemSectionRenderer": {"contents": [
                {"videoRenderer": {
                    "videoId": "abc",
                    "title": {"runs": [{"text": "First &amp; best"}]},
                    "ownerText": {"runs": [{"text": "Chan A"}]},
                    "viewCountText": {"simpleText": "1,234,567 views"}
                }},
                {"adSlotRenderer": {}},
                {"videoRenderer": {
                    "videoId": "def",
                    "title": {"runs": [{"text": "Second"}]}
                }}
            ]}}]}}
        });
        let items = parse_results_page(&page(&data)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["title"], "First & best");
        assert_eq!(items[0]["channel"], "Chan A");
        assert_eq!(items[0]["views"], 1_234_567);
        assert_eq!(items[0]["url"], "https://www.youtube.com/watch?v=abc");
        assert_eq!(items[1]["channel"], "Unknown");
        assert_eq!(items[1]["views"], 0);
    }

    #[test]
    fn caps_at_fifteen() {
        let videos: Vec<Value> = (0..20)
            .map(|i| json!({"videoRenderer": {"videoId": format!("v{i}"), "title": {"simpleText": "t"}}}))
            .collect();
        let items = parse_results_page(&page(&json!({ "contents": videos }))).unwrap();
        assert_eq!(items.len(), 15);
    }

    #[test]
    fn page_without_initial_data_is_a_parse_error() {
        let err = parse_results_page("<html>consent wall</html>").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);
    }

    #[test]
    fn view_count_ignores_separators() {
        assert_eq!(parse_view_count("12,345 watching"), 12_345);
        assert_eq!(parse_view_count("No views"), 0);
    }
}
