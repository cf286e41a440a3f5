//! Heuristic relevance scoring for discovered items.
//!
//! Pure functions. The composite relevance blends keyword overlap with the
//! publication's vocabulary, recency, and a per-source-type weight.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use newsroom_core::SourceType;
use regex::Regex;
use serde::Serialize;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "has", "have", "been", "from", "with", "they", "this", "that", "will", "each", "which",
    "their", "about", "would", "there", "these", "other", "into", "more", "some",
];

const UNKNOWN_SOURCE_WEIGHT: f64 = 0.5;
const NEUTRAL_KEYWORD_SCORE: f64 = 50.0;
const UNDATED_RECENCY_SCORE: f64 = 40.0;

/// `(max age in days, score)`, checked in order.
const RECENCY_BUCKETS: &[(f64, f64)] = &[
    (1.0, 100.0),
    (2.0, 85.0),
    (4.0, 70.0),
    (8.0, 50.0),
    (15.0, 30.0),
    (29.0, 15.0),
];
const STALE_RECENCY_SCORE: f64 = 5.0;
const MAX_RELEVANCE: f64 = 100.0;

static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]{3,}").expect("valid regex"));

/// Component scores for one item.
///
/// `base_relevance` is the composite before any triage multiplier, so the
/// multiplier is always applied to a freshly computed base and never
/// compounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub keyword_score: f64,
    pub recency_score: f64,
    pub source_weight: f64,
    pub base_relevance: f64,
    pub multiplier: f64,
    pub relevance_score: f64,
}

impl ScoreBreakdown {
    /// Apply a triage multiplier to the base composite, capped at 100.
    #[must_use]
    pub fn with_multiplier(self, multiplier: f64) -> Self {
        Self {
            multiplier,
            relevance_score: round2(self.base_relevance * multiplier).min(MAX_RELEVANCE),
            ..self
        }
    }

    /// Recompute recency and the base for a newly learned publish date,
    /// keeping the current multiplier.
    #[must_use]
    pub fn with_published_date(self, published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let recency_score = recency_score(published, now);
        let base_relevance = relevance(
            self.keyword_score,
            recency_score,
            self.source_weight,
            published.is_some(),
        );
        Self {
            recency_score,
            base_relevance,
            ..self
        }
        .with_multiplier(self.multiplier)
    }
}

/// Distinct lower-cased terms of three or more letters, stop words removed.
#[must_use]
pub fn industry_terms(industry_description: Option<&str>, source_keywords: Option<&str>) -> Vec<String> {
    let mut terms = BTreeSet::new();
    for text in [industry_description, source_keywords].into_iter().flatten() {
        let lowered = text.to_lowercase();
        for m in TERM_RE.find_iter(&lowered) {
            let term = m.as_str();
            if !STOP_WORDS.contains(&term) {
                terms.insert(term.to_string());
            }
        }
    }
    terms.into_iter().collect()
}

/// Share of `terms` found as substrings of "title snippet", 0-100.
///
/// With no terms configured the score is a neutral 50.
#[must_use]
pub fn keyword_score(title: Option<&str>, snippet: Option<&str>, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return NEUTRAL_KEYWORD_SCORE;
    }
    let text = format!("{} {}", title.unwrap_or(""), snippet.unwrap_or("")).to_lowercase();
    let matches = terms.iter().filter(|t| text.contains(t.as_str())).count();
    #[allow(clippy::cast_precision_loss)]
    let score = matches as f64 / terms.len() as f64 * 100.0;
    score.min(100.0)
}

/// Step function of the item's age. Undated items score 40; future dates
/// count as brand new.
#[must_use]
pub fn recency_score(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return UNDATED_RECENCY_SCORE;
    };
    #[allow(clippy::cast_precision_loss)]
    let age_days = (now - published).num_seconds().max(0) as f64 / 86_400.0;
    RECENCY_BUCKETS
        .iter()
        .find(|(max_age, _)| age_days < *max_age)
        .map_or(STALE_RECENCY_SCORE, |(_, score)| *score)
}

/// Trust weight of a source type, 0-1. Unknown types get 0.5.
#[must_use]
pub fn source_weight(source_type: Option<SourceType>) -> f64 {
    match source_type {
        Some(SourceType::Feed) => 1.0,
        Some(SourceType::Site) => 0.9,
        Some(SourceType::KeywordSearch) => 0.8,
        Some(SourceType::VideoKeywordSearch) => 0.75,
        Some(SourceType::CompetitorSite) => 0.7,
        Some(SourceType::StructuredDocument) => 0.85,
        Some(SourceType::HouseContent) => 0.3,
        None => UNKNOWN_SOURCE_WEIGHT,
    }
}

/// Composite relevance. Without a date the recency share is redistributed
/// to keyword and source in their original 5:2 ratio.
#[must_use]
pub fn relevance(keyword: f64, recency: f64, weight: f64, has_date: bool) -> f64 {
    let raw = if has_date {
        keyword * 0.50 + recency * 0.30 + weight * 100.0 * 0.20
    } else {
        keyword * 0.714 + weight * 100.0 * 0.286
    };
    round2(raw)
}

/// Score an item with a neutral multiplier of 1.
#[must_use]
pub fn score_item(
    title: Option<&str>,
    snippet: Option<&str>,
    published: Option<DateTime<Utc>>,
    source_type: Option<SourceType>,
    terms: &[String],
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let keyword_score = round2(keyword_score(title, snippet, terms));
    let recency_score = recency_score(published, now);
    let source_weight = source_weight(source_type);
    let base_relevance = relevance(keyword_score, recency_score, source_weight, published.is_some());
    ScoreBreakdown {
        keyword_score,
        recency_score,
        source_weight,
        base_relevance,
        multiplier: 1.0,
        relevance_score: base_relevance,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "scorer_test.rs"]
mod tests;
