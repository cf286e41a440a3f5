//! LLM analysis of document text into story angles.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};

use super::config::{DocumentSourceConfig, PreviousReport};
use crate::enrichment::{content_sources, formats};
use crate::error::ResearchError;
use crate::llm::strip_code_fence;
use crate::types::{keys, DiscoveredItem};

const RESPONSE_SHAPE: &str = r#"{
  "report_summary": "Brief 2-3 sentence overview of the report",
  "key_figures": {"metric_name": "value"},
  "story_angles": [
    {
      "headline": "Compelling news headline",
      "summary": "2-3 paragraph summary suitable for an article",
      "commodity": "relevant commodity or sector",
      "data_points": [{"metric": "...", "value": "...", "previous": "...", "change": "..."}],
      "significance": "high|medium|low",
      "angle_type": "supply_shift|demand_change|price_impact|trade_flow|policy_change|weather_impact|other"
    }
  ]
}"#;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StoryAngle {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub commodity: Option<String>,
    #[serde(default)]
    pub data_points: Value,
    #[serde(default)]
    pub significance: Option<String>,
    #[serde(default)]
    pub angle_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentAnalysis {
    #[serde(default)]
    pub report_summary: Option<String>,
    #[serde(default)]
    pub key_figures: Value,
    #[serde(default)]
    pub story_angles: Vec<StoryAngle>,
}

impl DocumentAnalysis {
    /// Value stored as `previous_report_data` for the next analysis.
    #[must_use]
    pub fn previous_report(&self, report_date: Option<&str>) -> Value {
        let key_figures = if self.key_figures.is_null() {
            json!({})
        } else {
            self.key_figures.clone()
        };
        json!({
            "report_date": report_date,
            "report_summary": self.report_summary,
            "key_figures": key_figures,
        })
    }
}

/// Prompt for one document: the source's instructions, the previous run's
/// summary when known, the document text, and the response shape.
#[must_use]
pub fn build_analysis_prompt(config: &DocumentSourceConfig, text: &str) -> String {
    let previous = config
        .previous_report_data
        .as_ref()
        .map(previous_context)
        .unwrap_or_default();
    format!(
        "{prompt}\n{previous}\n\n## Document Text\n\n{text}\n\n## Response Instructions\n\n\
         Respond with valid JSON only (no markdown fencing). Use this exact structure:\n\
         {RESPONSE_SHAPE}\n\n\
         Return up to {max} story angles, ordered by significance.",
        prompt = config.analysis_prompt,
        max = config.max_angles,
    )
}

fn previous_context(previous: &PreviousReport) -> String {
    let figures = if previous.key_figures.is_null() {
        "{}".to_string()
    } else {
        serde_json::to_string_pretty(&previous.key_figures).unwrap_or_else(|_| "{}".to_string())
    };
    format!(
        "\n\n## Previous Report Data (for month-over-month comparison)\n\
         Report date: {}\nSummary: {}\nKey figures: {figures}\n",
        previous.report_date.as_deref().unwrap_or("unknown"),
        previous.report_summary.as_deref().unwrap_or("N/A"),
    )
}

/// # Errors
///
/// Returns [`ResearchError::Llm`] when the response is not the expected JSON.
pub fn parse_analysis(text: &str) -> Result<DocumentAnalysis, ResearchError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ResearchError::Llm(format!("document analysis was not valid JSON: {e}")))
}

/// `document_url` with its fragment dropped and `angle=<index>` set.
#[must_use]
pub fn angle_url(document_url: &str, index: usize) -> String {
    let Ok(mut url) = Url::parse(document_url) else {
        return format!("{document_url}?angle={index}");
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "angle")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("angle", &index.to_string());
    url.to_string()
}

/// One pre-enriched item per story angle, at most `config.max_angles`.
#[must_use]
pub fn angles_to_items(
    analysis: &DocumentAnalysis,
    config: &DocumentSourceConfig,
    document_url: &str,
    report_date: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<DiscoveredItem> {
    analysis
        .story_angles
        .iter()
        .take(config.max_angles)
        .enumerate()
        .map(|(idx, angle)| {
            let index = idx + 1;
            let data_points = if angle.data_points.is_null() {
                json!([])
            } else {
                angle.data_points.clone()
            };
            DiscoveredItem::new(angle_url(document_url, index))
                .with_title(angle.headline.clone())
                .with_snippet(angle.summary.clone())
                .with_author(Some(config.publisher.clone()))
                .with_published(Some(now))
                .with_meta("report_name", config.report_name.as_str())
                .with_meta("publisher", config.publisher.as_str())
                .with_meta("report_date", report_date)
                .with_meta("commodity", angle.commodity.clone())
                .with_meta("data_points", data_points)
                .with_meta("significance", angle.significance.clone())
                .with_meta("angle_type", angle.angle_type.clone())
                .with_meta("angle_index", index)
                .with_meta("document_url", document_url)
                .with_meta(keys::FULL_CONTENT, angle.summary.clone().unwrap_or_default())
                .with_meta(keys::CONTENT_FORMAT, formats::ANALYSIS_SUMMARY)
                .with_meta(keys::CONTENT_SOURCE, content_sources::DOCUMENT_ANALYSIS)
        })
        .collect()
}
