//! Full-content enrichment of scored items.
//!
//! The strategy depends on what the item already carries and where it came
//! from. Only crawl scrapes cost money, so the orchestrator budgets those
//! and lets the others through.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use newsroom_core::SourceType;
use regex::Regex;
use reqwest::Url;
use serde_json::Value;

use crate::crawl::CrawlClient;
use crate::dates::{date_from_page_metadata, date_from_url};
use crate::transcript::{TranscriptBreaker, TranscriptClient};
use crate::types::{keys, Metadata};

const SKIP_SCHEMES: &[&str] = &["mailto", "tel", "javascript", "data", "about"];
const SKIP_HOSTS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "tiktok.com",
    "youtube.com",
];
const SKIP_EXTENSIONS: &[&str] = &[".pdf", ".xml", ".json", ".csv"];
const MIN_SINGLE_SEGMENT_LEN: usize = 16;

static SKIP_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/page/\d+$|-npage-\d+|/tag/|/category/|/author/|/search|/archive/|/events?(/|$)|/member(/|$)|/subscribe|/issue/|sitemap\.xml",
    )
    .expect("valid regex")
});
static DATE_ONLY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/\d{4}/(?:\d{1,2}|january|february|march|april|may|june|july|august|september|october|november|december)(?:-\d{1,2}-\d{4})?/?$",
    )
    .expect("valid regex")
});

pub mod formats {
    pub const MARKDOWN: &str = "markdown";
    pub const FEED_HTML: &str = "feed_html";
    pub const TRANSCRIPT: &str = "transcript";
    pub const ANALYSIS_SUMMARY: &str = "analysis_summary";
}

pub mod content_sources {
    pub const CRAWL_API: &str = "crawl_api";
    pub const FEED: &str = "feed";
    pub const VIDEO_TRANSCRIPT: &str = "video_transcript";
    pub const DOCUMENT_ANALYSIS: &str = "document_analysis";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStrategy {
    /// Content came with the item; only default keys are filled.
    PreEnriched,
    /// Promote the body captured from the feed.
    FeedContent,
    Transcript,
    Crawl,
}

impl EnrichmentStrategy {
    #[must_use]
    pub fn select(metadata: &Metadata, source_type: Option<SourceType>) -> Self {
        if source_type == Some(SourceType::StructuredDocument) {
            EnrichmentStrategy::PreEnriched
        } else if metadata.contains_key(keys::FEED_FULL_CONTENT) {
            EnrichmentStrategy::FeedContent
        } else if source_type == Some(SourceType::VideoKeywordSearch) {
            EnrichmentStrategy::Transcript
        } else {
            EnrichmentStrategy::Crawl
        }
    }

    /// Whether this strategy spends a paid external call.
    #[must_use]
    pub fn is_paid(self) -> bool {
        matches!(self, EnrichmentStrategy::Crawl)
    }
}

pub struct Enricher {
    crawl: Arc<CrawlClient>,
    transcripts: TranscriptClient,
    breaker: Arc<TranscriptBreaker>,
}

impl Enricher {
    #[must_use]
    pub fn new(
        crawl: Arc<CrawlClient>,
        transcripts: TranscriptClient,
        breaker: Arc<TranscriptBreaker>,
    ) -> Self {
        Self {
            crawl,
            transcripts,
            breaker,
        }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<TranscriptBreaker> {
        &self.breaker
    }

    /// Enrich `metadata` for the item at `url`. Never fails: problems are
    /// recorded under `enrichment_failed` and `enrichment_error`.
    pub async fn enrich(
        &self,
        url: &str,
        mut metadata: Metadata,
        source_type: Option<SourceType>,
        source_url: Option<&str>,
    ) -> Metadata {
        match EnrichmentStrategy::select(&metadata, source_type) {
            EnrichmentStrategy::PreEnriched => {
                metadata
                    .entry(keys::CONTENT_FORMAT)
                    .or_insert_with(|| formats::ANALYSIS_SUMMARY.into());
                metadata
                    .entry(keys::CONTENT_SOURCE)
                    .or_insert_with(|| content_sources::DOCUMENT_ANALYSIS.into());
            }
            EnrichmentStrategy::FeedContent => {
                let content = metadata
                    .get(keys::FEED_FULL_CONTENT)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                set_content(&mut metadata, content, formats::FEED_HTML, content_sources::FEED);
            }
            EnrichmentStrategy::Transcript => self.enrich_video(url, &mut metadata).await,
            EnrichmentStrategy::Crawl => self.enrich_article(url, &mut metadata, source_url).await,
        }
        metadata
    }

    async fn enrich_video(&self, url: &str, metadata: &mut Metadata) {
        if self.breaker.is_tripped() {
            set_failure(metadata, "video transcript skipped (IP blocked)");
            return;
        }
        let Some(video_id) = extract_video_id(url) else {
            set_failure(metadata, "could not extract video ID from URL");
            return;
        };

        match self.transcripts.fetch(&video_id).await {
            Ok(text) => set_content(
                metadata,
                text,
                formats::TRANSCRIPT,
                content_sources::VIDEO_TRANSCRIPT,
            ),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(video_id = %video_id, error = %e, "transcript fetch failed");
                if self.breaker.observe_failure(&message) {
                    tracing::info!("transcript service blocked this host, skipping transcripts");
                }
                set_failure(metadata, &message);
            }
        }
    }

    async fn enrich_article(&self, url: &str, metadata: &mut Metadata, source_url: Option<&str>) {
        if !is_scrapable_url(url, source_url) {
            set_failure(metadata, &format!("URL not scrapable: {url}"));
            return;
        }
        if !self.crawl.is_configured() {
            set_failure(metadata, "FIRECRAWL_API_KEY not configured");
            return;
        }

        let page = match self.crawl.scrape_page(url).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                set_failure(metadata, "crawl scrape returned no data");
                return;
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "crawl scrape failed");
                set_failure(metadata, &e.to_string());
                return;
            }
        };

        match page.markdown.filter(|m| !m.trim().is_empty()) {
            Some(markdown) => set_content(
                metadata,
                markdown,
                formats::MARKDOWN,
                content_sources::CRAWL_API,
            ),
            None => set_failure(metadata, "crawl scrape returned no content"),
        }

        let now = Utc::now();
        if let Some(published) =
            date_from_page_metadata(&page.metadata, now).or_else(|| date_from_url(url, now))
        {
            metadata.insert(
                keys::EXTRACTED_PUBLISHED_DATE.to_string(),
                published.to_rfc3339().into(),
            );
        }
    }
}

fn set_content(metadata: &mut Metadata, content: String, format: &str, source: &str) {
    let length = content.chars().count();
    metadata.insert(keys::FULL_CONTENT.to_string(), content.into());
    metadata.insert(keys::CONTENT_FORMAT.to_string(), format.into());
    metadata.insert(keys::CONTENT_SOURCE.to_string(), source.into());
    metadata.insert(keys::CONTENT_LENGTH.to_string(), length.into());
    metadata.insert(keys::ENRICHED_AT.to_string(), Utc::now().to_rfc3339().into());
    metadata.insert(keys::ENRICHMENT_FAILED.to_string(), false.into());
    metadata.insert(keys::ENRICHMENT_ERROR.to_string(), Value::Null);
}

fn set_failure(metadata: &mut Metadata, error: &str) {
    metadata.insert(keys::ENRICHMENT_FAILED.to_string(), true.into());
    metadata.insert(keys::ENRICHMENT_ERROR.to_string(), error.into());
}

/// Whether enrichment left a failure marker.
#[must_use]
pub fn enrichment_failed(metadata: &Metadata) -> bool {
    metadata
        .get(keys::ENRICHMENT_FAILED)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Publish date recorded by a crawl scrape.
#[must_use]
pub fn extracted_published_date(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata
        .get(keys::EXTRACTED_PUBLISHED_DATE)
        .and_then(Value::as_str)
        .and_then(crate::dates::parse_loose_date)
}

/// Whether `url` looks like an article page worth a paid scrape.
///
/// Rejects non-web schemes, social hosts, file downloads, listing and
/// navigation pages, date-only archives, short single-segment slugs, and
/// the source's own listing page.
#[must_use]
pub fn is_scrapable_url(url: &str, source_url: Option<&str>) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if SKIP_SCHEMES.contains(&parsed.scheme()) {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let bare = host.strip_prefix("www.").unwrap_or(&host);
    if SKIP_HOSTS.contains(&bare) {
        return false;
    }

    let path = parsed.path().trim_end_matches('/');
    let lower = path.to_ascii_lowercase();
    if SKIP_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    if path.is_empty() || url.ends_with('#') || url.ends_with("#content") {
        return false;
    }
    if SKIP_PATH.is_match(path) || DATE_ONLY_PATH.is_match(path) {
        return false;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 && segments.first().map_or(0, |s| s.len()) < MIN_SINGLE_SEGMENT_LEN {
        return false;
    }

    if let Some(source_path) = source_url.and_then(|s| Url::parse(s).ok()) {
        if path == source_path.path().trim_end_matches('/') {
            return false;
        }
    }
    true
}

/// Video ID from `youtube.com/watch?v=`, `/shorts/<id>`, or `youtu.be/<id>`.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let id = match host.as_str() {
        "www.youtube.com" | "youtube.com" | "m.youtube.com" => {
            if parsed.path() == "/watch" {
                parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
            } else {
                parsed
                    .path()
                    .strip_prefix("/shorts/")
                    .and_then(|rest| rest.split('/').next())
                    .map(str::to_string)
            }
        }
        "youtu.be" => Some(parsed.path().trim_start_matches('/').to_string()),
        _ => None,
    };
    id.filter(|id| !id.is_empty())
}
