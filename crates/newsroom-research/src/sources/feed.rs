//! RSS/Atom feed fetching and parsing.

use std::time::Duration;

use feed_rs::model::Entry;
use reqwest::Client;

use crate::error::ResearchError;
use crate::http::check_status;
use crate::types::{keys, DiscoveredItem};

const SERVICE: &str = "feed";

/// Fetch `url` and parse it as a feed.
///
/// # Errors
///
/// Returns a transport or status error, or [`ResearchError::Feed`] when the
/// body is not a feed.
pub async fn fetch_feed(
    http: &Client,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Vec<DiscoveredItem>, ResearchError> {
    let mut request = http.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }
    let response = check_status(SERVICE, request.send().await?).await?;
    let bytes = response.bytes().await?;
    parse_feed(&bytes)
}

/// Parse RSS, Atom, or JSON Feed bytes into discovered items. Entries without
/// a link are dropped.
///
/// # Errors
///
/// Returns [`ResearchError::Feed`] when the bytes are not a feed.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<DiscoveredItem>, ResearchError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| ResearchError::Feed(e.to_string()))?;
    let feed_title = feed.title.map(|t| t.content).unwrap_or_default();

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_to_item(entry, &feed_title))
        .collect())
}

fn entry_to_item(entry: Entry, feed_title: &str) -> Option<DiscoveredItem> {
    let url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let tags: Vec<String> = entry
        .categories
        .iter()
        .map(|c| c.term.clone())
        .filter(|t| !t.is_empty())
        .collect();
    let author = entry.authors.first().map(|p| p.name.clone());
    let body = entry
        .content
        .and_then(|c| c.body)
        .filter(|b| !b.trim().is_empty());

    let mut item = DiscoveredItem::new(url)
        .with_title(entry.title.map(|t| t.content))
        .with_snippet(entry.summary.map(|s| s.content))
        .with_author(author)
        .with_published(entry.published.or(entry.updated))
        .with_meta(keys::TAGS, tags)
        .with_meta(keys::FEED_TITLE, feed_title);
    if let Some(body) = body {
        item = item.with_meta(keys::FEED_FULL_CONTENT, body);
    }
    Some(item)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Grain Wire</title>
    <link>https://grainwire.example.com</link>
    <description>Grain news</description>
    <item>
      <title>Wheat futures climb on export demand</title>
      <link>https://grainwire.example.com/2026/10/18/wheat-futures-climb</link>
      <description>Wheat rallied as exporters booked cargoes.</description>
      <dc:creator>Dana Reyes</dc:creator>
      <category>wheat</category>
      <category>exports</category>
      <pubDate>Sun, 18 Oct 2026 09:30:00 +0000</pubDate>
      <content:encoded><![CDATA[<p>Full article body.</p>]]></content:encoded>
    </item>
    <item>
      <title>No link here</title>
      <description>Dropped.</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items() {
        let items = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(
            item.url,
            "https://grainwire.example.com/2026/10/18/wheat-futures-climb"
        );
        assert_eq!(item.title.as_deref(), Some("Wheat futures climb on export demand"));
        assert_eq!(
            item.published_date,
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap())
        );
        assert_eq!(item.meta_str(keys::FEED_TITLE), Some("Grain Wire"));
        assert_eq!(
            item.metadata[keys::TAGS],
            serde_json::json!(["wheat", "exports"])
        );
        assert!(item
            .meta_str(keys::FEED_FULL_CONTENT)
            .is_some_and(|b| b.contains("Full article body")));
    }

    #[test]
    fn parses_atom_with_updated_date() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Board Notes</title>
  <id>urn:board</id>
  <updated>2026-10-10T00:00:00Z</updated>
  <entry>
    <title>Rail rates hearing scheduled</title>
    <id>urn:entry:1</id>
    <link href="https://board.example.com/notes/rail-rates-hearing"/>
    <updated>2026-10-10T12:00:00Z</updated>
    <summary>The board set a hearing.</summary>
  </entry>
</feed>"#;
        let items = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].published_date,
            Some(Utc.with_ymd_and_hms(2026, 10, 10, 12, 0, 0).unwrap())
        );
        assert!(items[0].meta_str(keys::FEED_FULL_CONTENT).is_none());
    }

    #[test]
    fn rejects_non_feed_bodies() {
        assert!(matches!(
            parse_feed(b"<html><body>not a feed</body></html>"),
            Err(ResearchError::Feed(_))
        ));
    }
}
