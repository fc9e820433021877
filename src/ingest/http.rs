// src/ingest/http.rs
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::error::FetchError;

pub const USER_AGENT: &str = "TrendingDashboardV2/1.0";

/// Desktop browser UA; some pages only embed their data for browsers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared client for all fetchers. `timeout` bounds every request made through it.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Send and reject non-2xx responses with a typed error.
pub async fn send_checked(req: RequestBuilder) -> Result<Response, FetchError> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let remaining = resp
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Err(status_error(status, remaining.as_deref()))
}

pub fn status_error(status: StatusCode, ratelimit_remaining: Option<&str>) -> FetchError {
    let exhausted = ratelimit_remaining.is_some_and(|v| v.trim() == "0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        FetchError::rate_limited(format!("http status {status}"))
    } else {
        FetchError::unavailable(format!("http status {status}"))
    }
}

pub async fn get_json(req: RequestBuilder) -> Result<serde_json::Value, FetchError> {
    let body = send_checked(req).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

pub async fn get_text(req: RequestBuilder) -> Result<String, FetchError> {
    Ok(send_checked(req).await?.text().await?)
}
