//! Source scrapers, one strategy per source type.
//!
//! Scraping never fails: each strategy logs its problems and returns
//! whatever it found, possibly nothing.

pub mod feed;
pub mod keyword_search;
pub mod site;
pub mod structured_document;
pub mod video_search;

use std::sync::Arc;

use newsroom_core::SourceType;
use reqwest::Client;

use self::site::SiteScraper;
use self::structured_document::DocumentScraper;
use crate::crawl::CrawlClient;
use crate::search::SearchClient;
use crate::types::{keys, DiscoveredItem, SourceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStrategy {
    Feed,
    Site { competitor: bool },
    KeywordSearch,
    VideoSearch,
    StructuredDocument,
}

/// Strategy for a source type; `None` for house content and unknown types.
#[must_use]
pub fn strategy_for(source_type: Option<SourceType>) -> Option<ScrapeStrategy> {
    match source_type? {
        SourceType::Feed => Some(ScrapeStrategy::Feed),
        SourceType::Site => Some(ScrapeStrategy::Site { competitor: false }),
        SourceType::CompetitorSite => Some(ScrapeStrategy::Site { competitor: true }),
        SourceType::KeywordSearch => Some(ScrapeStrategy::KeywordSearch),
        SourceType::VideoKeywordSearch => Some(ScrapeStrategy::VideoSearch),
        SourceType::StructuredDocument => Some(ScrapeStrategy::StructuredDocument),
        SourceType::HouseContent => None,
    }
}

pub struct ScraperSet {
    http: Client,
    crawl: Arc<CrawlClient>,
    search: Arc<SearchClient>,
    documents: DocumentScraper,
}

impl ScraperSet {
    #[must_use]
    pub fn new(
        http: Client,
        crawl: Arc<CrawlClient>,
        search: Arc<SearchClient>,
        documents: DocumentScraper,
    ) -> Self {
        Self {
            http,
            crawl,
            search,
            documents,
        }
    }

    /// Items discovered for `source` by `strategy`.
    pub async fn scrape(&self, strategy: ScrapeStrategy, source: &SourceRecord) -> Vec<DiscoveredItem> {
        let items = match strategy {
            ScrapeStrategy::Feed => {
                match feed::fetch_feed(&self.http, &source.url, None).await {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!(source = %source.name, url = %source.url, error = %e, "feed fetch failed");
                        Vec::new()
                    }
                }
            }
            ScrapeStrategy::Site { competitor } => {
                let scraper = SiteScraper {
                    http: &self.http,
                    crawl: self.crawl.as_ref(),
                };
                let items = scraper.scrape(source).await;
                if competitor {
                    items
                        .into_iter()
                        .map(|item| item.with_meta(keys::IS_COMPETITOR, true))
                        .collect()
                } else {
                    items
                }
            }
            ScrapeStrategy::KeywordSearch => keyword_search::scrape(&self.search, source).await,
            ScrapeStrategy::VideoSearch => video_search::scrape(&self.search, source).await,
            ScrapeStrategy::StructuredDocument => self.documents.scrape(source).await,
        };
        tracing::debug!(source = %source.name, source_id = source.id, items = items.len(), "source scraped");
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_but_house_content_has_a_strategy() {
        for source_type in SourceType::ALL {
            let strategy = strategy_for(Some(source_type));
            assert_eq!(strategy.is_none(), source_type == SourceType::HouseContent);
        }
        assert_eq!(strategy_for(None), None);
        assert_eq!(
            strategy_for(Some(SourceType::CompetitorSite)),
            Some(ScrapeStrategy::Site { competitor: true })
        );
    }
}
