use newsroom_core::PublicationSeed;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub publications: usize,
    pub sources: usize,
}

/// Upsert publications (by slug) and their sources (by publication and name).
///
/// All upserts run inside a single transaction; if any operation fails the
/// entire batch is rolled back. A seeded source's `config` replaces the
/// stored one only when the seed provides one, so state written back by the
/// pipeline survives re-seeding.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_publications(
    pool: &PgPool,
    publications: &[PublicationSeed],
) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for publication in publications {
        let publication_id: i64 = sqlx::query_scalar(
            "INSERT INTO publications \
                 (name, slug, industry_description, reader_personas, publication_domain, \
                  review_mode, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 industry_description = EXCLUDED.industry_description, \
                 reader_personas = EXCLUDED.reader_personas, \
                 publication_domain = EXCLUDED.publication_domain, \
                 review_mode = EXCLUDED.review_mode, \
                 is_active = EXCLUDED.is_active, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(&publication.name)
        .bind(publication.slug.trim())
        .bind(&publication.industry_description)
        .bind(&publication.reader_personas)
        .bind(&publication.publication_domain)
        .bind(publication.review_mode)
        .bind(publication.is_active)
        .fetch_one(&mut *tx)
        .await?;

        for source in &publication.sources {
            sqlx::query(
                "INSERT INTO sources \
                     (publication_id, name, source_type, url, keywords, config, is_active) \
                 VALUES ($1, $2, $3, $4, $5, COALESCE($6, '{}'::jsonb), $7) \
                 ON CONFLICT (publication_id, name) DO UPDATE SET \
                     source_type = EXCLUDED.source_type, \
                     url = EXCLUDED.url, \
                     keywords = EXCLUDED.keywords, \
                     config = CASE WHEN $6 IS NULL THEN sources.config \
                                   ELSE sources.config || $6 END, \
                     is_active = EXCLUDED.is_active, \
                     updated_at = NOW()",
            )
            .bind(publication_id)
            .bind(&source.name)
            .bind(source.source_type.as_str())
            .bind(&source.url)
            .bind(&source.keywords)
            .bind(&source.config)
            .bind(source.is_active)
            .execute(&mut *tx)
            .await?;

            summary.sources += 1;
        }

        summary.publications += 1;
    }

    tx.commit().await?;
    Ok(summary)
}
