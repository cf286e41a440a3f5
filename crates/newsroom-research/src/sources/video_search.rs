use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::dates::parse_loose_date;
use crate::search::{SearchClient, VideoResult};
use crate::types::{keys, DiscoveredItem, SourceRecord};

static RELATIVE_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:streamed\s+)?(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago$")
        .expect("valid regex")
});

pub async fn scrape(search: &SearchClient, source: &SourceRecord) -> Vec<DiscoveredItem> {
    let Some(query) = source.keywords.as_deref().filter(|k| !k.trim().is_empty()) else {
        tracing::debug!(source = %source.name, "video source has no keywords");
        return Vec::new();
    };
    if !search.is_configured() {
        tracing::warn!(source = %source.name, "SERPAPI_API_KEY not configured, skipping video search");
        return Vec::new();
    }

    let now = Utc::now();
    match search.videos(query).await {
        Ok(results) => results
            .into_iter()
            .filter_map(|result| video_item(result, now))
            .collect(),
        Err(e) => {
            tracing::warn!(source = %source.name, query, error = %e, "video search failed");
            Vec::new()
        }
    }
}

/// Dates like "3 days ago" as an instant relative to `now`; absolute dates
/// are parsed as usual.
#[must_use]
pub fn parse_video_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let Some(caps) = RELATIVE_AGE.captures(raw) else {
        return parse_loose_date(raw);
    };
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let age = match unit.as_str() {
        "second" => Duration::seconds(amount),
        "minute" => Duration::minutes(amount),
        "hour" => Duration::hours(amount),
        "day" => Duration::days(amount),
        "week" => Duration::weeks(amount),
        "month" => Duration::days(amount.checked_mul(30)?),
        "year" => Duration::days(amount.checked_mul(365)?),
        _ => return None,
    };
    now.checked_sub_signed(age)
}

fn video_item(result: VideoResult, now: DateTime<Utc>) -> Option<DiscoveredItem> {
    let link = result.link.filter(|l| !l.is_empty())?;
    let channel = result.channel.and_then(|c| c.name);
    let published = result
        .published_date
        .as_deref()
        .and_then(|raw| parse_video_date(raw, now));

    let mut item = DiscoveredItem::new(link)
        .with_title(result.title)
        .with_snippet(result.description)
        .with_author(channel.clone())
        .with_published(published)
        .with_meta(keys::CHANNEL, channel)
        .with_meta(keys::VIEWS, result.views)
        .with_meta(keys::DURATION, result.length);
    if let Some(thumbnail) = result.thumbnail.and_then(|t| t.static_url) {
        item = item.with_meta(keys::THUMBNAIL, thumbnail);
    }
    Some(item)
}
