use crate::dates::parse_loose_date;
use crate::search::{NewsResult, SearchClient};
use crate::types::{keys, DiscoveredItem, SourceRecord};

pub async fn scrape(search: &SearchClient, source: &SourceRecord) -> Vec<DiscoveredItem> {
    let Some(query) = source.keywords.as_deref().filter(|k| !k.trim().is_empty()) else {
        tracing::debug!(source = %source.name, "keyword source has no keywords");
        return Vec::new();
    };
    if !search.is_configured() {
        tracing::warn!(source = %source.name, "SERPAPI_API_KEY not configured, skipping keyword search");
        return Vec::new();
    }

    match search.news(query).await {
        Ok(results) => results.into_iter().filter_map(news_item).collect(),
        Err(e) => {
            tracing::warn!(source = %source.name, query, error = %e, "news search failed");
            Vec::new()
        }
    }
}

fn news_item(result: NewsResult) -> Option<DiscoveredItem> {
    let link = result.link.filter(|l| !l.is_empty())?;
    let outlet = result.source.and_then(|s| s.name);
    let published = result.date.as_deref().and_then(parse_loose_date);

    let mut item = DiscoveredItem::new(link)
        .with_title(result.title)
        .with_snippet(result.snippet)
        .with_author(outlet.clone())
        .with_published(published)
        .with_meta(keys::SOURCE_NAME, outlet);
    if let Some(thumbnail) = result.thumbnail {
        item = item.with_meta(keys::THUMBNAIL, thumbnail);
    }
    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::NewsSourceInfo;

    #[test]
    fn maps_news_result() {
        let item = news_item(NewsResult {
            link: Some("https://wire.example.com/corn-exports".into()),
            title: Some("Corn exports jump".into()),
            snippet: Some("Exports rose 12%.".into()),
            source: Some(NewsSourceInfo {
                name: Some("Farm Wire".into()),
            }),
            thumbnail: None,
            date: Some("10/18/2026, 07:00 AM, +0000 UTC".into()),
        })
        .unwrap();
        assert_eq!(item.author.as_deref(), Some("Farm Wire"));
        assert_eq!(item.meta_str(keys::SOURCE_NAME), Some("Farm Wire"));
        assert!(item.published_date.is_some());
        assert!(!item.metadata.contains_key(keys::THUMBNAIL));
    }

    #[test]
    fn drops_results_without_link() {
        assert!(news_item(NewsResult::default()).is_none());
    }
}
