use sqlx::PgPool;

use crate::DbError;

/// Whether any published article of the publication cites `normalized_url`.
///
/// `source_url` may hold several URLs, so this is a case-insensitive
/// substring match. `LIKE` wildcards in the URL are escaped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure.
pub async fn published_content_matches(
    pool: &PgPool,
    publication_id: i64,
    normalized_url: &str,
) -> Result<bool, DbError> {
    let pattern = format!("%{}%", escape_like(normalized_url));

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS ( \
             SELECT 1 FROM published_content \
             WHERE publication_id = $1 AND source_url ILIKE $2 ESCAPE '\\' \
         )",
    )
    .bind(publication_id)
    .bind(pattern)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(
            escape_like("https://a.com/100%_real"),
            "https://a.com/100\\%\\_real"
        );
    }

    #[test]
    fn plain_urls_are_unchanged() {
        assert_eq!(escape_like("https://a.com/story"), "https://a.com/story");
    }
}
