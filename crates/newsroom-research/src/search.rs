//! Client for the search API's news and video engines.

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ResearchError;
use crate::http::{check_status, endpoint, parse_base_url, read_json};

const SERVICE: &str = "search API";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsSourceInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsResult {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub source: Option<NewsSourceInfo>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoChannel {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoThumbnail {
    #[serde(default, rename = "static")]
    pub static_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoResult {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channel: Option<VideoChannel>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<VideoThumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    news_results: Vec<NewsResult>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoResponse {
    #[serde(default)]
    video_results: Vec<VideoResult>,
}

pub struct SearchClient {
    http: Client,
    api_key: Option<String>,
    base_url: Url,
}

impl SearchClient {
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidUrl`] if `base_url` is not a valid URL.
    pub fn new(http: Client, api_key: Option<String>, base_url: &str) -> Result<Self, ResearchError> {
        Ok(Self {
            http,
            api_key,
            base_url: parse_base_url(base_url)?,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// US English news results for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::MissingConfig`] without an API key, or any
    /// transport, status, or decoding error.
    pub async fn news(&self, query: &str) -> Result<Vec<NewsResult>, ResearchError> {
        let response: NewsResponse = self
            .get(&[
                ("engine", "google_news"),
                ("q", query),
                ("gl", "us"),
                ("hl", "en"),
            ])
            .await?;
        Ok(response.news_results)
    }

    /// Video results for `query`.
    ///
    /// # Errors
    ///
    /// Same as [`SearchClient::news`].
    pub async fn videos(&self, query: &str) -> Result<Vec<VideoResult>, ResearchError> {
        let response: VideoResponse = self
            .get(&[("engine", "youtube"), ("search_query", query)])
            .await?;
        Ok(response.video_results)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, ResearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ResearchError::MissingConfig("SERPAPI_API_KEY".to_string()))?;
        let url = endpoint(&self.base_url, "search.json")?;

        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("api_key", api_key)])
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;
        read_json(response, "search results").await
    }
}
