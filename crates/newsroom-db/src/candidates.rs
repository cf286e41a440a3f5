//! Database operations for `candidates`.

use chrono::{DateTime, Utc};
use newsroom_core::CandidateStatus;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `candidates` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub publication_id: i64,
    pub source_id: Option<i64>,
    pub url: String,
    pub url_hash: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub keyword_score: f64,
    pub recency_score: f64,
    pub source_weight: f64,
    pub relevance_score: f64,
    pub status: String,
    pub extra_metadata: serde_json::Value,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate ready to be written. Built by the research pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidate {
    pub publication_id: i64,
    pub source_id: Option<i64>,
    pub url: String,
    pub url_hash: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub keyword_score: f64,
    pub recency_score: f64,
    pub source_weight: f64,
    pub relevance_score: f64,
    pub status: CandidateStatus,
    pub extra_metadata: serde_json::Value,
}

/// Filters for [`list_candidates`].
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pub publication_id: i64,
    pub status: Option<CandidateStatus>,
    pub min_score: Option<f64>,
    pub source_id: Option<i64>,
    pub limit: i64,
}

const CANDIDATE_COLUMNS: &str = "id, publication_id, source_id, url, url_hash, title, snippet, \
     author, published_date, keyword_score, recency_score, source_weight, relevance_score, \
     status, extra_metadata, discovered_at, updated_at";

const INSERT_CANDIDATE: &str = "INSERT INTO candidates \
     (publication_id, source_id, url, url_hash, title, snippet, author, published_date, \
      keyword_score, recency_score, source_weight, relevance_score, status, extra_metadata) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Whether a candidate with this hash already exists for the publication.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn candidate_exists(
    pool: &PgPool,
    publication_id: i64,
    url_hash: &str,
) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM candidates WHERE publication_id = $1 AND url_hash = $2)",
    )
    .bind(publication_id)
    .bind(url_hash)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Fetch one candidate scoped to its publication.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn get_candidate(
    pool: &PgPool,
    publication_id: i64,
    candidate_id: i64,
) -> Result<Option<CandidateRow>, DbError> {
    let row = sqlx::query_as::<_, CandidateRow>(&format!(
        "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE publication_id = $1 AND id = $2"
    ))
    .bind(publication_id)
    .bind(candidate_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Candidates for a publication, best first: relevance descending, then most
/// recently discovered.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn list_candidates(
    pool: &PgPool,
    filter: &CandidateFilter,
) -> Result<Vec<CandidateRow>, DbError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE publication_id = "
    ));
    qb.push_bind(filter.publication_id);

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(min_score) = filter.min_score {
        qb.push(" AND relevance_score >= ").push_bind(min_score);
    }
    if let Some(source_id) = filter.source_id {
        qb.push(" AND source_id = ").push_bind(source_id);
    }

    qb.push(" ORDER BY relevance_score DESC, discovered_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit);

    let rows = qb
        .build_query_as::<CandidateRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert every candidate and stamp the publication's `last_research_run` in
/// a single transaction. Any failure rolls back the whole batch.
///
/// Returns the number of candidates written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert or the stamp fails, including a
/// unique-constraint collision on `(publication_id, url_hash)`.
pub async fn insert_candidates_and_mark_run(
    pool: &PgPool,
    publication_id: i64,
    candidates: &[NewCandidate],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for candidate in candidates {
        bind_candidate(sqlx::query(INSERT_CANDIDATE), candidate)
            .execute(&mut *tx)
            .await?;
    }

    let result = sqlx::query(
        "UPDATE publications SET last_research_run = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(publication_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    tx.commit().await?;
    Ok(candidates.len())
}

/// Insert one candidate unless its `(publication_id, url_hash)` already exists.
///
/// Returns `true` when a row was written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn insert_candidate_if_absent(
    pool: &PgPool,
    candidate: &NewCandidate,
) -> Result<bool, DbError> {
    let sql = format!("{INSERT_CANDIDATE} ON CONFLICT (publication_id, url_hash) DO NOTHING");
    let result = bind_candidate(sqlx::query(&sql), candidate)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Move one candidate to a new status.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the candidate does not belong to the
/// publication, or [`DbError::Sqlx`] on query failure.
pub async fn update_candidate_status(
    pool: &PgPool,
    publication_id: i64,
    candidate_id: i64,
    status: CandidateStatus,
) -> Result<CandidateRow, DbError> {
    let row = sqlx::query_as::<_, CandidateRow>(&format!(
        "UPDATE candidates SET status = $3, updated_at = NOW() \
         WHERE publication_id = $1 AND id = $2 \
         RETURNING {CANDIDATE_COLUMNS}"
    ))
    .bind(publication_id)
    .bind(candidate_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Move several candidates of one publication to a new status.
///
/// Ids belonging to other publications are ignored. Returns rows updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn bulk_update_candidate_status(
    pool: &PgPool,
    publication_id: i64,
    candidate_ids: &[i64],
    status: CandidateStatus,
) -> Result<u64, DbError> {
    if candidate_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE candidates SET status = $3, updated_at = NOW() \
         WHERE publication_id = $1 AND id = ANY($2)",
    )
    .bind(publication_id)
    .bind(candidate_ids)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn bind_candidate<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    candidate: &'q NewCandidate,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(candidate.publication_id)
        .bind(candidate.source_id)
        .bind(&candidate.url)
        .bind(&candidate.url_hash)
        .bind(&candidate.title)
        .bind(&candidate.snippet)
        .bind(&candidate.author)
        .bind(candidate.published_date)
        .bind(candidate.keyword_score)
        .bind(candidate.recency_score)
        .bind(candidate.source_weight)
        .bind(candidate.relevance_score)
        .bind(candidate.status.as_str())
        .bind(&candidate.extra_metadata)
}
