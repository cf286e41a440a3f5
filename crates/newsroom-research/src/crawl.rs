//! Client for the managed web-crawl API (`/v1/map` and `/v1/scrape`).
//!
//! Every call goes through one shared [`CrawlRateLimiter`], so concurrent
//! research runs never exceed the configured call rate between them. A 429
//! is retried once after the server's `Retry-After`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::ResearchError;
use crate::http::{check_status, endpoint, parse_base_url, read_json};
use crate::types::Metadata;

const SERVICE: &str = "crawl API";
const MAP_TIMEOUT: Duration = Duration::from_secs(30);
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

/// Spaces crawl calls at least `min_interval` apart across all callers.
///
/// Holds the earliest instant the next call may start. `acquire` keeps the
/// lock while it waits, so waiters are served one at a time.
#[derive(Debug)]
pub struct CrawlRateLimiter {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl CrawlRateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call is allowed, then reserve the next slot.
    pub async fn acquire(&self) {
        let mut next_allowed = self.next_allowed.lock().await;
        if let Some(at) = *next_allowed {
            tokio::time::sleep_until(at).await;
        }
        *next_allowed = Some(Instant::now() + self.min_interval);
    }
}

/// A link returned by the site-map call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLink {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Result of scraping one page as markdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub markdown: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMappedLink {
    Url(String),
    Detailed {
        url: Option<String>,
        title: Option<String>,
        description: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct MapResponse {
    #[serde(default)]
    links: Vec<RawMappedLink>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    metadata: Metadata,
}

pub struct CrawlClient {
    http: Client,
    api_key: Option<String>,
    base_url: Url,
    limiter: Arc<CrawlRateLimiter>,
}

impl CrawlClient {
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidUrl`] if `base_url` is not a valid URL.
    pub fn new(
        http: Client,
        api_key: Option<String>,
        base_url: &str,
        limiter: Arc<CrawlRateLimiter>,
    ) -> Result<Self, ResearchError> {
        Ok(Self {
            http,
            api_key,
            base_url: parse_base_url(base_url)?,
            limiter,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<CrawlRateLimiter> {
        &self.limiter
    }

    /// List links on a site, optionally ranked by a search phrase.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::MissingConfig`] without an API key, or any
    /// transport, status, or decoding error.
    pub async fn map_site(
        &self,
        url: &str,
        search: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MappedLink>, ResearchError> {
        let mut body = json!({ "url": url, "limit": limit });
        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            body["search"] = json!(search);
        }
        let response: MapResponse = self.post("v1/map", &body, MAP_TIMEOUT).await?;

        Ok(response
            .links
            .into_iter()
            .filter_map(|link| match link {
                RawMappedLink::Url(url) => Some(MappedLink {
                    url,
                    title: None,
                    description: None,
                }),
                RawMappedLink::Detailed {
                    url,
                    title,
                    description,
                } => url.filter(|u| !u.is_empty()).map(|url| MappedLink {
                    url,
                    title,
                    description,
                }),
            })
            .collect())
    }

    /// All links found on a single page.
    ///
    /// # Errors
    ///
    /// Same as [`CrawlClient::map_site`].
    pub async fn scrape_links(&self, url: &str) -> Result<Vec<String>, ResearchError> {
        let body = json!({ "url": url, "formats": ["links"] });
        let response: ScrapeResponse = self.post("v1/scrape", &body, MAP_TIMEOUT).await?;
        Ok(response.data.map(|d| d.links).unwrap_or_default())
    }

    /// Scrape one page as markdown with its page metadata.
    ///
    /// Returns `None` when the service answers without a `data` object.
    ///
    /// # Errors
    ///
    /// Same as [`CrawlClient::map_site`].
    pub async fn scrape_page(&self, url: &str) -> Result<Option<ScrapedPage>, ResearchError> {
        let body = json!({ "url": url, "formats": ["markdown"] });
        let response: ScrapeResponse = self.post("v1/scrape", &body, SCRAPE_TIMEOUT).await?;
        Ok(response.data.map(|d| ScrapedPage {
            markdown: d.markdown,
            metadata: d.metadata,
        }))
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ResearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ResearchError::MissingConfig("FIRECRAWL_API_KEY".to_string()))?;
        let url = endpoint(&self.base_url, path)?;

        let mut retried = false;
        loop {
            self.limiter.acquire().await;
            let response = self
                .http
                .post(url.clone())
                .bearer_auth(api_key)
                .json(body)
                .timeout(timeout)
                .send()
                .await?;

            match check_status(SERVICE, response).await {
                Ok(response) => return read_json(response, path).await,
                Err(ResearchError::RateLimited {
                    retry_after_secs, ..
                }) if !retried => {
                    let wait = retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    tracing::info!(path, wait_secs = wait, "crawl API rate limited, retrying once");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
