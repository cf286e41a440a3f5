use newsroom_core::CandidateStatus;
use newsroom_db::CandidateFilter;

const TITLE_WIDTH: usize = 60;

pub(crate) fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        format!("{}...", title.chars().take(TITLE_WIDTH).collect::<String>())
    } else {
        title.to_string()
    }
}

/// Print a publication's candidates, best first.
///
/// Without `status`, shows `selected` for publications in review mode and
/// `new` otherwise.
///
/// # Errors
///
/// Returns an error if the publication does not exist or a query fails.
pub(crate) async fn run_list_candidates(
    pool: &sqlx::PgPool,
    publication_id: i64,
    status: Option<CandidateStatus>,
    min_score: Option<f64>,
    limit: i64,
) -> anyhow::Result<()> {
    let publication = newsroom_db::get_publication(pool, publication_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("publication {publication_id} not found"))?;

    let status = status.unwrap_or(if publication.review_mode {
        CandidateStatus::Selected
    } else {
        CandidateStatus::New
    });
    let filter = CandidateFilter {
        publication_id,
        status: Some(status),
        min_score,
        source_id: None,
        limit: limit.clamp(1, 100),
    };
    let rows = newsroom_db::list_candidates(pool, &filter).await?;

    if rows.is_empty() {
        println!(
            "no {status} candidates for {}; run `research {publication_id}` first",
            publication.slug
        );
        return Ok(());
    }

    println!("{:<8}{:<8}{:<12}TITLE", "ID", "SCORE", "PUBLISHED");
    for row in &rows {
        let published = row
            .published_date
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string());
        let title = row.title.as_deref().unwrap_or(&row.url);
        println!(
            "{:<8}{:<8.1}{:<12}{}",
            row.id,
            row.relevance_score,
            published,
            truncate_title(title)
        );
    }

    Ok(())
}
