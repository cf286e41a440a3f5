//! One research run for one publication.
//!
//! A run moves through three phases that never roll each other back:
//!
//! 1. discover and dedup: every active source is scraped (bounded fan-out,
//!    results consumed in source order) and each item is fingerprinted and
//!    checked against this run, stored candidates, and published content;
//! 2. triage: non-exempt items are classified in grouped LLM calls;
//! 3. score, enrich and persist: not-news items become zero-scored rejected
//!    candidates, everything else is scored, optionally enriched, date
//!    backfilled, rescored and kept as `new`.
//!
//! All candidates are committed together with the `last_research_run`
//! stamp. If that transaction fails, candidates are written one at a time
//! and the stamp is set on its own.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use newsroom_core::{AppConfig, CandidateStatus, SourceType};
use newsroom_db::NewCandidate;
use serde_json::Value;
use sqlx::PgPool;

use crate::crawl::{CrawlClient, CrawlRateLimiter};
use crate::dates::date_from_url;
use crate::dedup::{bare_host, fingerprint};
use crate::enrichment::{enrichment_failed, extracted_published_date, Enricher, EnrichmentStrategy};
use crate::error::ResearchError;
use crate::http::build_http_client;
use crate::llm::LlmClient;
use crate::scorer::{industry_terms, score_item};
use crate::search::SearchClient;
use crate::sources::structured_document::DocumentScraper;
use crate::sources::{strategy_for, ScraperSet};
use crate::stats::RunStats;
use crate::store::{CandidateStore, PgStore};
use crate::transcript::{TranscriptBreaker, TranscriptClient};
use crate::triage::{TriageSettings, TriageVerdict, Triager, Verdict};
use crate::types::{keys, DiscoveredItem, PublicationContext, SourceRecord};

/// Knobs for one run that are not owned by a collaborator.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub enrichment_min_score: f64,
    /// Paid enrichment calls allowed per run.
    pub enrichment_max_per_run: usize,
    pub max_item_age_days: i64,
    pub source_concurrency: usize,
    pub triage_enabled: bool,
}

impl ResearchSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            enrichment_min_score: config.enrichment_min_score,
            enrichment_max_per_run: config.enrichment_max_per_run,
            max_item_age_days: config.max_item_age_days,
            source_concurrency: config.source_concurrency.max(1),
            triage_enabled: config.triage_enabled,
        }
    }
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            enrichment_min_score: 25.0,
            enrichment_max_per_run: 50,
            max_item_age_days: 90,
            source_concurrency: 4,
            triage_enabled: true,
        }
    }
}

/// An item that survived phase 1.
struct PendingItem {
    item: DiscoveredItem,
    source_index: usize,
    /// Normalized URL, the form that is stored and hashed.
    url: String,
    url_hash: String,
}

pub struct ResearchEngine {
    store: Arc<dyn CandidateStore>,
    scrapers: ScraperSet,
    triager: Triager,
    enricher: Enricher,
    settings: ResearchSettings,
}

impl ResearchEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn CandidateStore>,
        scrapers: ScraperSet,
        triager: Triager,
        enricher: Enricher,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            store,
            scrapers,
            triager,
            enricher,
            settings,
        }
    }

    /// Wire an engine against Postgres and the configured external services.
    ///
    /// `limiter` and `breaker` are process-wide so that concurrent runs share
    /// the crawl pacing and the transcript circuit.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or a configured
    /// base URL is invalid.
    pub fn from_config(
        pool: PgPool,
        config: &AppConfig,
        limiter: Arc<CrawlRateLimiter>,
        breaker: Arc<TranscriptBreaker>,
    ) -> Result<Self, ResearchError> {
        let http = build_http_client(config.http_timeout_secs, &config.http_user_agent)?;
        let store = Arc::new(PgStore::new(pool));

        let crawl = Arc::new(CrawlClient::new(
            http.clone(),
            config.firecrawl_api_key.clone(),
            &config.firecrawl_base_url,
            limiter,
        )?);
        let search = Arc::new(SearchClient::new(
            http.clone(),
            config.serpapi_api_key.clone(),
            &config.serpapi_base_url,
        )?);
        let llm = Arc::new(LlmClient::new(
            http.clone(),
            config.anthropic_api_key.clone(),
            &config.anthropic_base_url,
        )?);
        let transcripts = TranscriptClient::new(http.clone(), config.transcript_api_url.as_deref())?;

        let documents = DocumentScraper::new(
            http.clone(),
            Arc::clone(&crawl),
            Arc::clone(&llm),
            store.clone(),
            config.analysis_model.clone(),
        );
        let scrapers = ScraperSet::new(http, Arc::clone(&crawl), search, documents);
        let triager = Triager::new(llm, Arc::clone(&crawl), TriageSettings::from_app_config(config));
        let enricher = Enricher::new(crawl, transcripts, breaker);

        Ok(Self::new(
            store,
            scrapers,
            triager,
            enricher,
            ResearchSettings::from_app_config(config),
        ))
    }

    #[must_use]
    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Run discovery for one publication and return the run's counters.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::PublicationNotFound`] or
    /// [`ResearchError::PublicationInactive`] before any work is done, a
    /// store error if the sources cannot be loaded, and a store error if the
    /// research-run stamp cannot be written after the per-row fallback.
    pub async fn research_publication(&self, publication_id: i64) -> Result<RunStats, ResearchError> {
        let publication = self
            .store
            .load_publication(publication_id)
            .await?
            .ok_or(ResearchError::PublicationNotFound(publication_id))?;
        if !publication.is_active {
            return Err(ResearchError::PublicationInactive(publication_id));
        }

        let sources = self.store.active_sources(publication_id).await?;
        let excluded = exclusion_hosts(&publication, &sources);
        if !excluded.is_empty() {
            tracing::info!(publication_id, hosts = ?excluded, "keyword search exclusion hosts");
        }

        let now = Utc::now();
        let mut stats = RunStats::default();

        let pending = self.discover(&publication, &sources, &excluded, now, &mut stats).await;
        tracing::info!(
            publication_id,
            discovered = stats.total_discovered,
            pending = pending.len(),
            duplicates = stats.skipped_duplicates,
            excluded = stats.skipped_excluded,
            "discovery complete"
        );

        let verdicts = self.triage(&publication, &sources, &pending, &mut stats).await;
        let candidates = self
            .score_and_enrich(&publication, &sources, pending, &verdicts, now, &mut stats)
            .await;

        self.persist(publication_id, &candidates, &mut stats).await?;

        tracing::info!(
            publication_id,
            sources_scanned = stats.sources_scanned,
            new_candidates = stats.new_candidates,
            enriched = stats.enriched,
            triage_rejected = stats.triage_rejected,
            errors = stats.errors,
            "research run complete"
        );
        Ok(stats)
    }

    async fn discover(
        &self,
        publication: &PublicationContext,
        sources: &[SourceRecord],
        excluded: &HashSet<String>,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> Vec<PendingItem> {
        let scrapes: Vec<(usize, Vec<DiscoveredItem>)> = stream::iter(sources.iter().enumerate())
            .filter_map(|(idx, source)| async move {
                let Some(strategy) = strategy_for(source.source_type) else {
                    tracing::info!(source = %source.name, source_id = source.id, "no scraper for source type, skipping");
                    return None;
                };
                Some((idx, strategy))
            })
            .map(|(idx, strategy)| async move { (idx, self.scrapers.scrape(strategy, &sources[idx]).await) })
            .buffered(self.settings.source_concurrency.max(1))
            .boxed()
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for (source_index, items) in scrapes {
            let source = &sources[source_index];
            stats.sources_scanned += 1;
            stats.total_discovered += items.len();

            for item in items {
                let (normalized, hash) = match fingerprint(&item.url) {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(url = %item.url, error = %e, "could not fingerprint item");
                        stats.errors += 1;
                        continue;
                    }
                };

                match self.is_duplicate(publication.id, &normalized, &hash, &seen).await {
                    Ok(true) => {
                        tracing::debug!(url = %item.url, "duplicate item skipped");
                        stats.skipped_duplicates += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(url = %item.url, error = %e, "duplicate check failed");
                        stats.errors += 1;
                        continue;
                    }
                }

                if source.source_type == Some(SourceType::KeywordSearch)
                    && bare_host(&item.url).is_some_and(|host| excluded.contains(&host))
                {
                    tracing::debug!(url = %item.url, "item from excluded host skipped");
                    stats.skipped_excluded += 1;
                    continue;
                }

                if is_too_old(&item, self.settings.max_item_age_days, now) {
                    tracing::debug!(url = %item.url, "item older than max age skipped");
                    stats.skipped_excluded += 1;
                    continue;
                }

                seen.insert(hash.clone());
                pending.push(PendingItem {
                    item,
                    source_index,
                    url: normalized,
                    url_hash: hash,
                });
            }
        }
        pending
    }

    async fn is_duplicate(
        &self,
        publication_id: i64,
        normalized: &str,
        hash: &str,
        seen: &HashSet<String>,
    ) -> Result<bool, ResearchError> {
        if seen.contains(hash) {
            return Ok(true);
        }
        if self.store.candidate_exists(publication_id, hash).await? {
            return Ok(true);
        }
        self.store.already_published(publication_id, normalized).await
    }

    /// One entry per pending item; `None` when triage is off or the item is exempt.
    async fn triage(
        &self,
        publication: &PublicationContext,
        sources: &[SourceRecord],
        pending: &[PendingItem],
        stats: &mut RunStats,
    ) -> Vec<Option<TriageVerdict>> {
        if !self.settings.triage_enabled || pending.is_empty() {
            return vec![None; pending.len()];
        }

        let source_types: Vec<Option<SourceType>> = pending
            .iter()
            .map(|p| sources[p.source_index].source_type)
            .collect();
        stats.triage_skipped += source_types
            .iter()
            .filter(|st| st.is_some_and(SourceType::skips_triage))
            .count();

        let items: Vec<DiscoveredItem> = pending.iter().map(|p| p.item.clone()).collect();
        let verdicts = self.triager.classify(&items, &source_types, publication).await;
        for verdict in verdicts.iter().flatten() {
            match verdict.verdict {
                Verdict::Relevant => stats.triage_relevant += 1,
                Verdict::Ambiguous => stats.triage_maybe += 1,
                Verdict::NotNews => stats.triage_rejected += 1,
            }
        }
        verdicts
    }

    async fn score_and_enrich(
        &self,
        publication: &PublicationContext,
        sources: &[SourceRecord],
        pending: Vec<PendingItem>,
        verdicts: &[Option<TriageVerdict>],
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> Vec<NewCandidate> {
        let mut paid_calls = 0usize;
        let mut candidates = Vec::with_capacity(pending.len());

        for (idx, entry) in pending.into_iter().enumerate() {
            let source = &sources[entry.source_index];
            let verdict = verdicts.get(idx).cloned().flatten();

            if let Some(v) = verdict.as_ref().filter(|v| v.verdict == Verdict::NotNews) {
                candidates.push(rejected_candidate(publication.id, source, entry, v));
                stats.new_candidates += 1;
                continue;
            }

            let item = entry.item;
            let terms = industry_terms(
                publication.industry_description.as_deref(),
                source.keywords.as_deref(),
            );
            let multiplier = verdict.as_ref().map_or(1.0, |v| v.verdict.multiplier());
            let mut scores = score_item(
                item.title.as_deref(),
                item.snippet.as_deref(),
                item.published_date,
                source.source_type,
                &terms,
                now,
            )
            .with_multiplier(multiplier);

            let strategy = EnrichmentStrategy::select(&item.metadata, source.source_type);
            let wants_enrichment = scores.relevance_score >= self.settings.enrichment_min_score;
            let mut metadata = item.metadata;

            if strategy == EnrichmentStrategy::PreEnriched {
                metadata = self
                    .enricher
                    .enrich(&item.url, metadata, source.source_type, Some(&source.url))
                    .await;
                stats.enrichment_skipped += 1;
            } else if wants_enrichment
                && (!strategy.is_paid() || paid_calls < self.settings.enrichment_max_per_run)
            {
                if strategy.is_paid() {
                    paid_calls += 1;
                }
                metadata = self
                    .enricher
                    .enrich(&item.url, metadata, source.source_type, Some(&source.url))
                    .await;
                if enrichment_failed(&metadata) {
                    stats.enrichment_failed += 1;
                } else {
                    stats.enriched += 1;
                }
            } else if wants_enrichment {
                tracing::debug!(url = %item.url, "enrichment budget exhausted");
                metadata.insert(keys::ENRICHMENT_SKIPPED.to_string(), Value::Bool(true));
                stats.enrichment_budget_exhausted += 1;
                stats.enrichment_skipped += 1;
            } else {
                stats.enrichment_skipped += 1;
            }

            let mut published_date = item.published_date;
            if published_date.is_none() {
                published_date = verdict
                    .as_ref()
                    .and_then(|v| v.published_date)
                    .or_else(|| extracted_published_date(&metadata))
                    .or_else(|| date_from_url(&item.url, now));
                if published_date.is_some() {
                    scores = scores.with_published_date(published_date, now);
                }
            }

            if let Some(v) = &verdict {
                metadata.insert(keys::TRIAGE_VERDICT.to_string(), v.verdict.as_str().into());
                metadata.insert(keys::TRIAGE_REASONING.to_string(), v.reasoning.clone().into());
            }

            candidates.push(NewCandidate {
                publication_id: publication.id,
                source_id: Some(source.id),
                url: entry.url,
                url_hash: entry.url_hash,
                title: item.title,
                snippet: item.snippet,
                author: item.author,
                published_date,
                keyword_score: scores.keyword_score,
                recency_score: scores.recency_score,
                source_weight: scores.source_weight,
                relevance_score: scores.relevance_score,
                status: CandidateStatus::New,
                extra_metadata: Value::Object(metadata),
            });
            stats.new_candidates += 1;
        }
        candidates
    }

    async fn persist(
        &self,
        publication_id: i64,
        candidates: &[NewCandidate],
        stats: &mut RunStats,
    ) -> Result<(), ResearchError> {
        let err = match self.store.commit_run(publication_id, candidates).await {
            Ok(inserted) => {
                tracing::debug!(publication_id, inserted, "candidates committed");
                return Ok(());
            }
            Err(e) => e,
        };
        tracing::warn!(
            publication_id,
            error = %err,
            "bulk commit failed, persisting candidates one at a time"
        );

        let mut saved = 0usize;
        for candidate in candidates {
            match self.store.insert_candidate_if_absent(candidate).await {
                Ok(true) => saved += 1,
                Ok(false) => {
                    tracing::debug!(url = %candidate.url, "candidate already stored");
                    stats.errors += 1;
                }
                Err(e) => {
                    tracing::warn!(url = %candidate.url, error = %e, "failed to store candidate");
                    stats.errors += 1;
                }
            }
        }
        stats.new_candidates = saved;

        self.store.mark_research_run(publication_id).await?;
        tracing::info!(publication_id, saved, total = candidates.len(), "fallback persistence complete");
        Ok(())
    }
}

/// Hosts whose pages keyword-search results must not duplicate: the
/// publication's own domain plus competitor and house-content sources.
/// Stored without a leading `www.` so both spellings match.
fn exclusion_hosts(publication: &PublicationContext, sources: &[SourceRecord]) -> HashSet<String> {
    let mut hosts = HashSet::new();
    if let Some(domain) = publication
        .publication_domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        let host = bare_host(domain)
            .or_else(|| bare_host(&format!("https://{domain}")))
            .unwrap_or_else(|| domain.to_ascii_lowercase());
        hosts.insert(host);
    }
    for source in sources {
        if source.source_type.is_some_and(SourceType::is_exclusion_source) {
            if let Some(host) = bare_host(&source.url) {
                hosts.insert(host);
            }
        }
    }
    hosts
}

/// Age is taken from the scraper's date, else a date in the URL. Undated
/// items are never too old.
fn is_too_old(item: &DiscoveredItem, max_age_days: i64, now: DateTime<Utc>) -> bool {
    item.published_date
        .or_else(|| date_from_url(&item.url, now))
        .is_some_and(|date| (now - date).num_days() > max_age_days)
}

fn rejected_candidate(
    publication_id: i64,
    source: &SourceRecord,
    entry: PendingItem,
    verdict: &TriageVerdict,
) -> NewCandidate {
    let mut metadata = entry.item.metadata;
    metadata.insert(keys::TRIAGE_VERDICT.to_string(), verdict.verdict.as_str().into());
    metadata.insert(keys::TRIAGE_REASONING.to_string(), verdict.reasoning.clone().into());
    NewCandidate {
        publication_id,
        source_id: Some(source.id),
        url: entry.url,
        url_hash: entry.url_hash,
        title: entry.item.title,
        snippet: entry.item.snippet,
        author: entry.item.author,
        published_date: entry.item.published_date,
        keyword_score: 0.0,
        recency_score: 0.0,
        source_weight: 0.0,
        relevance_score: 0.0,
        status: CandidateStatus::Rejected,
        extra_metadata: Value::Object(metadata),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn source(id: i64, source_type: SourceType, url: &str) -> SourceRecord {
        SourceRecord {
            id,
            name: format!("source {id}"),
            source_type: Some(source_type),
            url: url.to_string(),
            keywords: None,
            config: json!({}),
        }
    }

    fn publication(domain: Option<&str>) -> PublicationContext {
        PublicationContext {
            id: 1,
            name: "Grain Ledger".into(),
            industry_description: None,
            reader_personas: None,
            publication_domain: domain.map(str::to_string),
            is_active: true,
        }
    }

    #[test]
    fn exclusion_hosts_cover_domain_competitors_and_house_content() {
        let sources = vec![
            source(1, SourceType::CompetitorSite, "https://www.rival.example/news"),
            source(2, SourceType::HouseContent, "https://blog.grainledger.example"),
            source(3, SourceType::Feed, "https://wire.example/rss"),
        ];
        let hosts = exclusion_hosts(&publication(Some("www.GrainLedger.example")), &sources);
        let mut hosts: Vec<_> = hosts.into_iter().collect();
        hosts.sort();
        assert_eq!(
            hosts,
            vec!["blog.grainledger.example", "grainledger.example", "rival.example"]
        );
    }

    #[test]
    fn age_uses_scraper_date_then_url_date() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let old = DiscoveredItem::new("https://a.example/x")
            .with_published(Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()));
        assert!(is_too_old(&old, 90, now));

        let old_by_url = DiscoveredItem::new("https://a.example/2025/01/15/wheat-harvest");
        assert!(is_too_old(&old_by_url, 90, now));

        let recent = DiscoveredItem::new("https://a.example/x")
            .with_published(Some(Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()));
        assert!(!is_too_old(&recent, 90, now));
        assert!(!is_too_old(&DiscoveredItem::new("https://a.example/undated"), 90, now));
    }

    #[test]
    fn rejected_candidates_are_zero_scored_with_triage_metadata() {
        let entry = PendingItem {
            item: DiscoveredItem::new("https://a.example/jobs").with_title(Some("We're hiring".into())),
            source_index: 0,
            url: "https://a.example/jobs".into(),
            url_hash: "abc".into(),
        };
        let verdict = TriageVerdict {
            verdict: Verdict::NotNews,
            reasoning: "job listing".into(),
            published_date: None,
        };
        let candidate = rejected_candidate(1, &source(7, SourceType::Site, "https://a.example"), entry, &verdict);
        assert_eq!(candidate.status, CandidateStatus::Rejected);
        assert_eq!(candidate.source_id, Some(7));
        assert!(candidate.relevance_score.abs() < f64::EPSILON);
        assert_eq!(candidate.extra_metadata[keys::TRIAGE_VERDICT], "not_news");
        assert_eq!(candidate.extra_metadata[keys::TRIAGE_REASONING], "job listing");
    }
}
