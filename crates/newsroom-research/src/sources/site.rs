//! News-site discovery: feed probes, the WordPress posts API, then the crawl
//! API's site map with a link-scrape fallback.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::feed::fetch_feed;
use crate::crawl::CrawlClient;
use crate::dates::parse_loose_date;
use crate::error::ResearchError;
use crate::http::check_status;
use crate::types::{DiscoveredItem, SourceRecord};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const ORIGIN_FEED_PATHS: &[&str] = &["/feed", "/rss", "/rss.xml", "/feed.xml", "/atom.xml", "/index.xml"];
const WP_POSTS_PATH: &str = "/wp-json/wp/v2/posts?per_page=20";
const MAP_LIMIT: u32 = 50;
const MIN_MAPPED_LINKS: usize = 5;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    title: Option<Rendered>,
    #[serde(default)]
    excerpt: Option<Rendered>,
    #[serde(default)]
    date_gmt: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Feed URLs to probe for `source_url`, most specific first.
#[must_use]
pub fn probe_urls(source_url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(source_url) else {
        return Vec::new();
    };
    let origin = parsed.origin().ascii_serialization();
    let mut urls = Vec::new();

    let path = parsed.path().trim_end_matches('/');
    if !path.is_empty() {
        urls.push(format!("{origin}{path}/feed"));
    }
    urls.extend(ORIGIN_FEED_PATHS.iter().map(|p| format!("{origin}{p}")));
    urls.dedup();
    urls
}

/// Plain text from a rendered HTML fragment.
fn strip_html(html: &str) -> String {
    HTML_TAG
        .replace_all(html, "")
        .replace("&#8217;", "'")
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

pub struct SiteScraper<'a> {
    pub http: &'a Client,
    pub crawl: &'a CrawlClient,
}

impl SiteScraper<'_> {
    pub async fn scrape(&self, source: &SourceRecord) -> Vec<DiscoveredItem> {
        for probe in probe_urls(&source.url) {
            match fetch_feed(self.http, &probe, Some(PROBE_TIMEOUT)).await {
                Ok(items) if !items.is_empty() => {
                    tracing::debug!(source = %source.name, feed = %probe, items = items.len(), "site feed probe matched");
                    return items;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(feed = %probe, error = %e, "site feed probe missed"),
            }
        }

        match self.wordpress_posts(&source.url).await {
            Ok(items) if !items.is_empty() => {
                tracing::debug!(source = %source.name, items = items.len(), "site posts API matched");
                return items;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(source = %source.name, error = %e, "site posts API missed"),
        }

        if !self.crawl.is_configured() {
            tracing::warn!(source = %source.name, "FIRECRAWL_API_KEY not configured, no fallback for site");
            return Vec::new();
        }

        let mut items: Vec<DiscoveredItem> = match self
            .crawl
            .map_site(&source.url, source.keywords.as_deref(), MAP_LIMIT)
            .await
        {
            Ok(links) => links
                .into_iter()
                .map(|link| {
                    DiscoveredItem::new(link.url)
                        .with_title(link.title)
                        .with_snippet(link.description)
                })
                .collect(),
            Err(e) => {
                tracing::warn!(source = %source.name, url = %source.url, error = %e, "site map failed");
                Vec::new()
            }
        };

        if items.len() < MIN_MAPPED_LINKS {
            match self.crawl.scrape_links(&source.url).await {
                Ok(links) => items.extend(
                    links
                        .into_iter()
                        .filter(|l| l.starts_with("http"))
                        .map(DiscoveredItem::new),
                ),
                Err(e) => {
                    tracing::warn!(source = %source.name, url = %source.url, error = %e, "site link scrape failed");
                }
            }
        }
        items
    }

    async fn wordpress_posts(&self, source_url: &str) -> Result<Vec<DiscoveredItem>, ResearchError> {
        let origin = Url::parse(source_url)
            .map_err(|e| ResearchError::InvalidUrl {
                url: source_url.to_string(),
                reason: e.to_string(),
            })?
            .origin()
            .ascii_serialization();
        let response = self
            .http
            .get(format!("{origin}{WP_POSTS_PATH}"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        let response = check_status("posts API", response).await?;
        let bytes = response.bytes().await?;
        let posts: Vec<WpPost> =
            serde_json::from_slice(&bytes).map_err(|e| ResearchError::Deserialize {
                context: "posts API".to_string(),
                source: e,
            })?;

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let link = post.link.filter(|l| !l.is_empty())?;
                let published = post
                    .date_gmt
                    .as_deref()
                    .or(post.date.as_deref())
                    .and_then(parse_loose_date);
                Some(
                    DiscoveredItem::new(link)
                        .with_title(post.title.map(|t| strip_html(&t.rendered)))
                        .with_snippet(post.excerpt.map(|e| strip_html(&e.rendered)))
                        .with_published(published),
                )
            })
            .collect())
    }
}
