use chrono::{DateTime, Utc};
use newsroom_core::SourceType;
use newsroom_db::{PublicationRow, SourceRow};
use serde::Serialize;

/// Open bag of per-item attributes carried from scraping to persistence.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata keys the pipeline reads or writes.
pub mod keys {
    pub const FEED_FULL_CONTENT: &str = "feed_full_content";
    pub const FEED_TITLE: &str = "feed_title";
    pub const TAGS: &str = "tags";
    pub const IS_COMPETITOR: &str = "is_competitor";
    pub const SOURCE_NAME: &str = "source_name";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const CHANNEL: &str = "channel";
    pub const VIEWS: &str = "views";
    pub const DURATION: &str = "duration";

    pub const FULL_CONTENT: &str = "full_content";
    pub const CONTENT_FORMAT: &str = "content_format";
    pub const CONTENT_SOURCE: &str = "content_source";
    pub const CONTENT_LENGTH: &str = "content_length";
    pub const ENRICHED_AT: &str = "enriched_at";
    pub const ENRICHMENT_FAILED: &str = "enrichment_failed";
    pub const ENRICHMENT_ERROR: &str = "enrichment_error";
    pub const ENRICHMENT_SKIPPED: &str = "enrichment_skipped";
    pub const EXTRACTED_PUBLISHED_DATE: &str = "extracted_published_date";

    pub const TRIAGE_VERDICT: &str = "triage_verdict";
    pub const TRIAGE_REASONING: &str = "triage_reasoning";
}

/// A link found by a scraper. Never persisted directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveredItem {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl DiscoveredItem {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: Option<String>) -> Self {
        self.snippet = snippet.filter(|s| !s.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author.filter(|a| !a.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_published(mut self, published: Option<DateTime<Utc>>) -> Self {
        self.published_date = published;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// String metadata value, when present and a string.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A configured source as the pipeline sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    /// `None` when the stored type name is unknown.
    pub source_type: Option<SourceType>,
    pub url: String,
    pub keywords: Option<String>,
    pub config: serde_json::Value,
}

impl From<SourceRow> for SourceRecord {
    fn from(row: SourceRow) -> Self {
        Self {
            id: row.id,
            source_type: SourceType::parse(&row.source_type),
            name: row.name,
            url: row.url,
            keywords: row.keywords,
            config: row.config,
        }
    }
}

/// Publication attributes the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationContext {
    pub id: i64,
    pub name: String,
    pub industry_description: Option<String>,
    pub reader_personas: Option<String>,
    pub publication_domain: Option<String>,
    pub is_active: bool,
}

impl From<PublicationRow> for PublicationContext {
    fn from(row: PublicationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            industry_description: row.industry_description,
            reader_personas: row.reader_personas,
            publication_domain: row.publication_domain,
            is_active: row.is_active,
        }
    }
}
