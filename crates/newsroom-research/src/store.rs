//! Persistence seams used by the research pipeline, and their Postgres
//! implementation.

use async_trait::async_trait;
use newsroom_db::NewCandidate;
use sqlx::PgPool;

use crate::error::ResearchError;
use crate::types::{PublicationContext, SourceRecord};

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn load_publication(&self, id: i64) -> Result<Option<PublicationContext>, ResearchError>;

    async fn active_sources(&self, publication_id: i64) -> Result<Vec<SourceRecord>, ResearchError>;

    async fn candidate_exists(&self, publication_id: i64, url_hash: &str) -> Result<bool, ResearchError>;

    /// Whether published content for the publication already covers `normalized_url`.
    async fn already_published(
        &self,
        publication_id: i64,
        normalized_url: &str,
    ) -> Result<bool, ResearchError>;

    /// Insert every candidate and stamp the research run in one transaction.
    async fn commit_run(
        &self,
        publication_id: i64,
        candidates: &[NewCandidate],
    ) -> Result<usize, ResearchError>;

    /// Insert one candidate unless its URL hash exists. Returns whether it was inserted.
    async fn insert_candidate_if_absent(&self, candidate: &NewCandidate) -> Result<bool, ResearchError>;

    async fn mark_research_run(&self, publication_id: i64) -> Result<(), ResearchError>;
}

/// Writes single keys into a source's JSON config.
#[async_trait]
pub trait SourceConfigStore: Send + Sync {
    async fn update_config_key(
        &self,
        source_id: i64,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), ResearchError>;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CandidateStore for PgStore {
    async fn load_publication(&self, id: i64) -> Result<Option<PublicationContext>, ResearchError> {
        Ok(newsroom_db::get_publication(&self.pool, id)
            .await?
            .map(PublicationContext::from))
    }

    async fn active_sources(&self, publication_id: i64) -> Result<Vec<SourceRecord>, ResearchError> {
        let rows = newsroom_db::list_active_sources(&self.pool, publication_id).await?;
        Ok(rows.into_iter().map(SourceRecord::from).collect())
    }

    async fn candidate_exists(&self, publication_id: i64, url_hash: &str) -> Result<bool, ResearchError> {
        Ok(newsroom_db::candidate_exists(&self.pool, publication_id, url_hash).await?)
    }

    async fn already_published(
        &self,
        publication_id: i64,
        normalized_url: &str,
    ) -> Result<bool, ResearchError> {
        Ok(newsroom_db::published_content_matches(&self.pool, publication_id, normalized_url).await?)
    }

    async fn commit_run(
        &self,
        publication_id: i64,
        candidates: &[NewCandidate],
    ) -> Result<usize, ResearchError> {
        Ok(newsroom_db::insert_candidates_and_mark_run(&self.pool, publication_id, candidates).await?)
    }

    async fn insert_candidate_if_absent(&self, candidate: &NewCandidate) -> Result<bool, ResearchError> {
        Ok(newsroom_db::insert_candidate_if_absent(&self.pool, candidate).await?)
    }

    async fn mark_research_run(&self, publication_id: i64) -> Result<(), ResearchError> {
        Ok(newsroom_db::touch_last_research_run(&self.pool, publication_id).await?)
    }
}

#[async_trait]
impl SourceConfigStore for PgStore {
    async fn update_config_key(
        &self,
        source_id: i64,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), ResearchError> {
        Ok(newsroom_db::update_source_config_key(&self.pool, source_id, key, value).await?)
    }
}
