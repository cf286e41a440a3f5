//! Candidate discovery: scrape a publication's sources, dedup, triage with an
//! LLM, score, enrich, and persist candidates.

pub mod conversation;
pub mod crawl;
pub mod dates;
pub mod dedup;
pub mod enrichment;
pub mod error;
pub(crate) mod http;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod scorer;
pub mod search;
pub mod sources;
pub mod stats;
pub mod store;
pub mod transcript;
pub mod triage;
pub mod types;

pub use crawl::{CrawlClient, CrawlRateLimiter};
pub use enrichment::{Enricher, EnrichmentStrategy};
pub use error::ResearchError;
pub use http::build_http_client;
pub use llm::LlmClient;
pub use pipeline::{ResearchEngine, ResearchSettings};
pub use retry::retry_with_backoff;
pub use scorer::ScoreBreakdown;
pub use search::SearchClient;
pub use sources::structured_document::DocumentScraper;
pub use sources::{strategy_for, ScrapeStrategy, ScraperSet};
pub use stats::RunStats;
pub use store::{CandidateStore, PgStore, SourceConfigStore};
pub use transcript::{TranscriptBreaker, TranscriptClient};
pub use triage::{TriageSettings, TriageVerdict, Triager, Verdict};
pub use types::{DiscoveredItem, Metadata, PublicationContext, SourceRecord};
