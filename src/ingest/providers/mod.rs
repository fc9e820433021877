// src/ingest/providers/mod.rs
pub mod github;
pub mod google_trends;
pub mod hackernews;
pub mod tiktok;
pub mod wikipedia;
pub mod youtube;

use std::sync::Arc;

use reqwest::Client;

use crate::ingest::types::Fetcher;

pub use github::GithubFetcher;
pub use google_trends::GoogleTrendsFetcher;
pub use hackernews::HackernewsFetcher;
pub use tiktok::TiktokFetcher;
pub use wikipedia::WikipediaFetcher;
pub use youtube::YoutubeFetcher;

/// Per-source knobs that are not endpoints.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub github_token: Option<String>,
    pub trends_geo: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            github_token: None,
            trends_geo: "US".to_string(),
        }
    }
}

/// The full production set, one fetcher per source, sharing one HTTP client.
pub fn default_fetchers(client: &Client, settings: &ProviderSettings) -> Vec<Arc<dyn Fetcher>> {
    vec![
        Arc::new(YoutubeFetcher::new(client.clone())),
        Arc::new(TiktokFetcher::new(client.clone())),
        Arc::new(WikipediaFetcher::new(client.clone())),
        Arc::new(HackernewsFetcher::new(client.clone())),
        Arc::new(GithubFetcher::new(
            client.clone(),
            settings.github_token.clone(),
        )),
        Arc::new(GoogleTrendsFetcher::new(
            client.clone(),
            settings.trends_geo.clone(),
        )),
    ]
}
