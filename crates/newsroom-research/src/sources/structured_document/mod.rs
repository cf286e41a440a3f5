//! Structured-document sources: periodic reports (usually PDFs) turned into
//! story-angle items by LLM analysis.
//!
//! Documents are found by URL pattern, landing-page links, or a JSON API,
//! then downloaded, reduced to text, and analysed. The summary of each
//! analysed document is written back to the source config so the next
//! analysis can compare against it.

pub mod analysis;
pub mod config;
pub mod discovery;
pub mod extract;

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;

use self::analysis::{angles_to_items, build_analysis_prompt, parse_analysis, DocumentAnalysis};
use self::config::{DocumentSourceConfig, PreviousReport};
use self::discovery::{DiscoveredDocument, DocumentDiscovery};
use crate::crawl::CrawlClient;
use crate::error::ResearchError;
use crate::llm::LlmClient;
use crate::store::SourceConfigStore;
use crate::types::{DiscoveredItem, SourceRecord};

pub const PREVIOUS_REPORT_KEY: &str = "previous_report_data";
const ANALYSIS_MAX_TOKENS: u32 = 4096;

pub struct DocumentScraper {
    http: Client,
    crawl: Arc<CrawlClient>,
    llm: Arc<LlmClient>,
    config_store: Arc<dyn SourceConfigStore>,
    model: String,
}

impl DocumentScraper {
    #[must_use]
    pub fn new(
        http: Client,
        crawl: Arc<CrawlClient>,
        llm: Arc<LlmClient>,
        config_store: Arc<dyn SourceConfigStore>,
        model: String,
    ) -> Self {
        Self {
            http,
            crawl,
            llm,
            config_store,
            model,
        }
    }

    pub async fn scrape(&self, source: &SourceRecord) -> Vec<DiscoveredItem> {
        let mut config = match DocumentSourceConfig::from_value(&source.config) {
            Ok(config) => config,
            Err(reason) => {
                tracing::warn!(source = %source.name, source_id = source.id, reason = %reason, "invalid document source config");
                return Vec::new();
            }
        };
        if !self.llm.is_configured() {
            tracing::warn!(source = %source.name, "ANTHROPIC_API_KEY not configured, skipping document source");
            return Vec::new();
        }

        let discovery = DocumentDiscovery {
            http: &self.http,
            crawl: self.crawl.as_ref(),
        };
        let documents = discovery.discover(&config, &source.url, Utc::now()).await;
        if documents.is_empty() {
            tracing::info!(source = %source.name, "no documents discovered");
            return Vec::new();
        }

        let mut items = Vec::new();
        for document in documents {
            match self.analyse(&config, &document).await {
                Ok(Some(analysis)) => {
                    items.extend(angles_to_items(
                        &analysis,
                        &config,
                        &document.url,
                        document.report_date.as_deref(),
                        Utc::now(),
                    ));
                    let previous = analysis.previous_report(document.report_date.as_deref());
                    if let Err(e) = self
                        .config_store
                        .update_config_key(source.id, PREVIOUS_REPORT_KEY, &previous)
                        .await
                    {
                        tracing::warn!(source_id = source.id, error = %e, "failed to store previous report data");
                    }
                    config.previous_report_data = Some(PreviousReport {
                        report_date: document.report_date.clone(),
                        report_summary: analysis.report_summary.clone(),
                        key_figures: analysis.key_figures.clone(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source = %source.name, url = %document.url, error = %e, "document analysis failed");
                }
            }
        }
        items
    }

    /// `Ok(None)` when the document has too little text to analyse.
    async fn analyse(
        &self,
        config: &DocumentSourceConfig,
        document: &DiscoveredDocument,
    ) -> Result<Option<DocumentAnalysis>, ResearchError> {
        let downloaded = extract::download(&self.http, &document.url).await?;
        let text = extract::extract_text(downloaded, &document.url).await?;
        let Some(text) = extract::prepare_for_analysis(&text) else {
            tracing::warn!(url = %document.url, "insufficient text extracted from document");
            return Ok(None);
        };

        let prompt = build_analysis_prompt(config, &text);
        let response = self.llm.complete(&self.model, ANALYSIS_MAX_TOKENS, prompt).await?;
        parse_analysis(&response).map(Some)
    }
}
