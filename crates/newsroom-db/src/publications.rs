//! Database operations for `publications`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `publications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublicationRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub industry_description: Option<String>,
    pub reader_personas: Option<String>,
    pub publication_domain: Option<String>,
    pub review_mode: bool,
    pub is_active: bool,
    pub last_research_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PUBLICATION_COLUMNS: &str = "id, name, slug, industry_description, reader_personas, \
     publication_domain, review_mode, is_active, last_research_run, created_at, updated_at";

/// Fetch a publication by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn get_publication(pool: &PgPool, id: i64) -> Result<Option<PublicationRow>, DbError> {
    let row = sqlx::query_as::<_, PublicationRow>(&format!(
        "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List every publication ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn list_publications(pool: &PgPool) -> Result<Vec<PublicationRow>, DbError> {
    let rows = sqlx::query_as::<_, PublicationRow>(&format!(
        "SELECT {PUBLICATION_COLUMNS} FROM publications ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Active publications that have at least one active source and whose last
/// research run is missing or older than `stale_before`.
///
/// Publications never researched come first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn list_publications_due_for_research(
    pool: &PgPool,
    stale_before: DateTime<Utc>,
) -> Result<Vec<PublicationRow>, DbError> {
    let rows = sqlx::query_as::<_, PublicationRow>(&format!(
        "SELECT {PUBLICATION_COLUMNS} FROM publications p \
         WHERE p.is_active \
           AND (p.last_research_run IS NULL OR p.last_research_run < $1) \
           AND EXISTS ( \
               SELECT 1 FROM sources s WHERE s.publication_id = p.id AND s.is_active \
           ) \
         ORDER BY p.last_research_run ASC NULLS FIRST, p.id"
    ))
    .bind(stale_before)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Stamp `last_research_run = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no publication has this id, or
/// [`DbError::Sqlx`] on query failure.
pub async fn touch_last_research_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE publications SET last_research_run = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
