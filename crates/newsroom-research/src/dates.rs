//! Publish-date recovery from URLs, page metadata, and loosely formatted strings.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::types::Metadata;

/// Page metadata fields holding a publish date, most reliable first.
const PAGE_DATE_FIELDS: &[&str] = &[
    "publishedTime",
    "article:published_time",
    "ogArticle:published_time",
    "modifiedTime",
    "article:modified_time",
];

const MAX_PAGE_DATE_AGE_DAYS: i64 = 730;
const MAX_URL_DATE_AGE_DAYS: i64 = 3650;
const EARLIEST_URL_YEAR: i32 = 2000;

const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

static URL_FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})/").expect("valid regex"));
static URL_HYPHEN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})-(\d{2})-(\d{2})-").expect("valid regex"));
static URL_YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/").expect("valid regex"));
static URL_NAMED_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    let names = MONTH_NAMES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)/(\d{{4}})/({names})(?:[/-]|$)")).expect("valid regex")
});
static URL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/").expect("valid regex"));

/// Parse a date string in any of the formats seen from feeds, search APIs,
/// page metadata, and LLM output. Naive values are taken as UTC.
#[must_use]
pub fn parse_loose_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Search API news dates look like "10/18/2026, 07:00 AM, +0000 UTC".
    if let Ok(dt) = DateTime::parse_from_str(raw, "%m/%d/%Y, %I:%M %p, %z UTC") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%b %d, %Y", "%B %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date_at_midnight(date);
        }
    }
    None
}

/// Publish date from crawl page metadata: first parseable field that is not
/// in the future and less than two years old.
#[must_use]
pub fn date_from_page_metadata(metadata: &Metadata, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    PAGE_DATE_FIELDS.iter().find_map(|field| {
        let value = metadata.get(*field)?;
        let raw = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(values) => values.first()?.as_str()?.to_string(),
            _ => return None,
        };
        let dt = parse_loose_date(&raw)?;
        (dt <= now && (now - dt).num_days() < MAX_PAGE_DATE_AGE_DAYS).then_some(dt)
    })
}

/// Publish date embedded in a URL path, tried pattern by pattern:
/// `/YYYY/MM/DD/`, `/YYYY-MM-DD-`, `/YYYY/MM/`, `/YYYY/<month name>`, and
/// finally `/YYYY/<slug>` as January 1. Dates in the future or ten or more
/// years old are ignored.
#[must_use]
pub fn date_from_url(url: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let plausible = |dt: DateTime<Utc>| dt <= now && (now - dt).num_days() < MAX_URL_DATE_AGE_DAYS;

    let ymd = |caps: &regex::Captures<'_>| -> Option<DateTime<Utc>> {
        let year = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2)?.as_str().parse().ok()?;
        let day = caps.get(3).map_or(Some(1), |d| d.as_str().parse().ok())?;
        date_at_midnight(NaiveDate::from_ymd_opt(year, month, day)?)
    };

    for pattern in [&*URL_FULL_DATE, &*URL_HYPHEN_DATE, &*URL_YEAR_MONTH] {
        if let Some(dt) = pattern.captures(url).and_then(|c| ymd(&c)).filter(|dt| plausible(*dt)) {
            return Some(dt);
        }
    }

    if let Some(caps) = URL_NAMED_MONTH.captures(url) {
        let year = caps.get(1).and_then(|y| y.as_str().parse::<i32>().ok());
        let month = caps.get(2).and_then(|m| month_number(m.as_str()));
        if let (Some(year), Some(month)) = (year, month) {
            if let Some(dt) = NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(date_at_midnight)
                .filter(|dt| plausible(*dt))
            {
                return Some(dt);
            }
        }
    }

    year_only_date(url, now).filter(|dt| (now - *dt).num_days() < MAX_URL_DATE_AGE_DAYS)
}

/// First `/YYYY/` segment not followed by another digit.
fn year_only_date(url: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut start = 0;
    while let Some(caps) = URL_YEAR.captures_at(url, start) {
        let whole = caps.get(0)?;
        let followed_by_digit = url[whole.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());
        if !followed_by_digit {
            let year: i32 = caps.get(1)?.as_str().parse().ok()?;
            if (EARLIEST_URL_YEAR..=now.year()).contains(&year) {
                return NaiveDate::from_ymd_opt(year, 1, 1).and_then(date_at_midnight);
            }
            return None;
        }
        start = whole.start() + 1;
    }
    None
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == lowered)
        .map(|(_, n)| *n)
}

fn date_at_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive))
}
