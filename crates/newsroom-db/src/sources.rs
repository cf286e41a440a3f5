//! Database operations for `sources`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `sources` table.
///
/// `source_type` is kept as the raw stored string; callers resolve it with
/// `newsroom_core::SourceType::parse` and skip names they do not recognise.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub publication_id: i64,
    pub name: String,
    pub source_type: String,
    pub url: String,
    pub keywords: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Active sources for a publication, in id order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn list_active_sources(
    pool: &PgPool,
    publication_id: i64,
) -> Result<Vec<SourceRow>, DbError> {
    let rows = sqlx::query_as::<_, SourceRow>(
        "SELECT id, publication_id, name, source_type, url, keywords, config, is_active, \
                created_at, updated_at \
         FROM sources \
         WHERE publication_id = $1 AND is_active \
         ORDER BY id",
    )
    .bind(publication_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Set a single top-level key of a source's `config` in one statement.
///
/// Other keys are untouched, so concurrent writers of different keys never
/// lose each other's updates.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the source does not exist, or
/// [`DbError::Sqlx`] on query failure.
pub async fn update_source_config_key(
    pool: &PgPool,
    source_id: i64,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sources \
         SET config = jsonb_set(COALESCE(config, '{}'::jsonb), ARRAY[$2], $3, true), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(source_id)
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
