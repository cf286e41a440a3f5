//! LLM triage of discovered items before any paid enrichment.
//!
//! Items are classified in batches. The model may fetch a handful of pages
//! per run through the `fetch_page` tool. Every failure degrades to the
//! ambiguous verdict, so triage can only lower or raise a score, never drop
//! an item on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use newsroom_core::{AppConfig, SourceType};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::conversation::{run_conversation, ConversationLimits, ToolHandler};
use crate::crawl::CrawlClient;
use crate::dates::parse_loose_date;
use crate::error::ResearchError;
use crate::http::truncate_chars;
use crate::llm::{LlmClient, Message, MessageRequest, ToolDefinition};
use crate::types::{DiscoveredItem, PublicationContext};

const FETCH_TOOL_NAME: &str = "fetch_page";
const MAX_RESPONSE_TOKENS: u32 = 4096;
const MAX_FETCHED_CHARS: usize = 3000;
const MAX_SNIPPET_CHARS: usize = 300;
const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(10);

const NO_KEY_REASON: &str = "triage skipped (no API key)";
const FALLBACK_REASON: &str = "triage fallback";
const NO_REASONING: &str = "no reasoning provided";
const TURNS_EXHAUSTED_NOTICE: &str =
    "[No more fetches available. Output your JSON verdicts now]";

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)```").expect("valid regex"));
static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    #[serde(rename = "relevant_news")]
    Relevant,
    #[serde(rename = "maybe")]
    Ambiguous,
    #[serde(rename = "not_news")]
    NotNews,
}

impl Verdict {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Relevant => "relevant_news",
            Verdict::Ambiguous => "maybe",
            Verdict::NotNews => "not_news",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "relevant_news" => Some(Verdict::Relevant),
            "maybe" => Some(Verdict::Ambiguous),
            "not_news" => Some(Verdict::NotNews),
            _ => None,
        }
    }

    /// Factor applied to the base relevance score.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Verdict::Relevant => 1.15,
            Verdict::Ambiguous => 1.0,
            Verdict::NotNews => 0.0,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriageVerdict {
    pub verdict: Verdict,
    pub reasoning: String,
    pub published_date: Option<DateTime<Utc>>,
}

impl TriageVerdict {
    fn ambiguous(reasoning: &str) -> Self {
        Self {
            verdict: Verdict::Ambiguous,
            reasoning: reasoning.to_string(),
            published_date: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriageSettings {
    pub model: String,
    pub batch_size: usize,
    /// Page fetches allowed across all batches of one run.
    pub fetch_budget: usize,
    pub max_concurrency: usize,
    pub rate_limit_delay: Duration,
    /// Items older than this are classified as not news.
    pub max_age_days: i64,
}

impl TriageSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            model: config.triage_model.clone(),
            batch_size: config.triage_batch_size.max(1),
            fetch_budget: config.triage_fetch_budget,
            max_concurrency: config.triage_max_concurrency.max(1),
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            max_age_days: config.max_item_age_days,
        }
    }
}

/// Turn cap for a batch starting now: one turn per fetch still left in the
/// run, plus room for the first reply and the final answer.
fn batch_limits(budget: &FetchBudget) -> ConversationLimits {
    ConversationLimits {
        max_turns: budget.remaining() + 2,
        exhausted_notice: TURNS_EXHAUSTED_NOTICE.to_string(),
    }
}

/// Page fetches left for the current run.
#[derive(Debug)]
pub struct FetchBudget {
    remaining: AtomicUsize,
}

impl FetchBudget {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
        }
    }

    /// Take one fetch if any remain.
    pub fn try_take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

/// Answers `fetch_page` calls by scraping through the crawl client.
pub struct FetchPageTool {
    crawl: Arc<CrawlClient>,
    budget: Arc<FetchBudget>,
}

impl FetchPageTool {
    #[must_use]
    pub fn new(crawl: Arc<CrawlClient>, budget: Arc<FetchBudget>) -> Self {
        Self { crawl, budget }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: FETCH_TOOL_NAME.to_string(),
            description: "Fetch the content of a web page to determine if it's a news article. \
                          Use when the title and snippet alone are not enough to classify the item."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL to fetch" }
                },
                "required": ["url"]
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for FetchPageTool {
    async fn handle(&self, name: &str, input: &Value) -> String {
        if name != FETCH_TOOL_NAME {
            return format!("[Unknown tool: {name}]");
        }
        let Some(url) = input.get("url").and_then(Value::as_str) else {
            return "[Missing url argument]".to_string();
        };
        if !self.crawl.is_configured() {
            return "[Page fetch unavailable: no crawl API key]".to_string();
        }
        if !self.budget.try_take() {
            return "[Fetch budget exceeded. Classify based on available information]".to_string();
        }

        match self.crawl.scrape_page(url).await {
            Ok(Some(page)) => {
                let markdown = page.markdown.unwrap_or_default();
                if markdown.trim().is_empty() {
                    format!("[No content extracted from {url}]")
                } else if markdown.chars().count() > MAX_FETCHED_CHARS {
                    format!(
                        "{}\n\n[... content truncated ...]",
                        truncate_chars(&markdown, MAX_FETCHED_CHARS)
                    )
                } else {
                    markdown
                }
            }
            Ok(None) => format!("[Failed to fetch {url}]"),
            Err(e) => {
                tracing::warn!(url, error = %e, "triage page fetch failed");
                format!("[Fetch error: {e}]")
            }
        }
    }
}

pub struct Triager {
    llm: Arc<LlmClient>,
    crawl: Arc<CrawlClient>,
    settings: TriageSettings,
}

impl Triager {
    #[must_use]
    pub fn new(llm: Arc<LlmClient>, crawl: Arc<CrawlClient>, settings: TriageSettings) -> Self {
        Self {
            llm,
            crawl,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &TriageSettings {
        &self.settings
    }

    /// Classify `items`, whose source types are given in parallel.
    ///
    /// Returns one entry per item in input order; `None` marks items whose
    /// source type is exempt from triage.
    pub async fn classify(
        &self,
        items: &[DiscoveredItem],
        source_types: &[Option<SourceType>],
        publication: &PublicationContext,
    ) -> Vec<Option<TriageVerdict>> {
        let classified: Vec<(usize, &DiscoveredItem, Option<SourceType>)> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (idx, item, source_types.get(idx).copied().flatten()))
            .filter(|(_, _, source_type)| !source_type.is_some_and(SourceType::skips_triage))
            .collect();

        let mut results: Vec<Option<TriageVerdict>> = vec![None; items.len()];
        if classified.is_empty() {
            return results;
        }

        if !self.llm.is_configured() {
            tracing::warn!("LLM API key not configured, skipping triage");
            for (idx, _, _) in classified {
                results[idx] = Some(TriageVerdict::ambiguous(NO_KEY_REASON));
            }
            return results;
        }

        let budget = Arc::new(FetchBudget::new(self.settings.fetch_budget));
        let system = build_system_prompt(publication, self.settings.max_age_days);
        let batches: Vec<Vec<(usize, &DiscoveredItem, Option<SourceType>)>> = classified
            .chunks(self.settings.batch_size)
            .map(<[_]>::to_vec)
            .collect();
        let batch_count = batches.len();

        let verdicts: Vec<(Vec<usize>, Vec<TriageVerdict>)> = stream::iter(batches)
            .map(|batch| {
                let budget = Arc::clone(&budget);
                let system = system.clone();
                async move {
                    let indices: Vec<usize> = batch.iter().map(|(idx, _, _)| *idx).collect();
                    let entries: Vec<(&DiscoveredItem, Option<SourceType>)> =
                        batch.iter().map(|(_, item, st)| (*item, *st)).collect();
                    let verdicts = self.triage_batch(&entries, system, budget).await;
                    (indices, verdicts)
                }
            })
            .buffered(self.settings.max_concurrency)
            .boxed()
            .collect()
            .await;

        for (indices, batch_verdicts) in verdicts {
            for (idx, verdict) in indices.into_iter().zip(batch_verdicts) {
                results[idx] = Some(verdict);
            }
        }

        tracing::info!(
            publication_id = publication.id,
            items = items.len(),
            batches = batch_count,
            fetches_used = self.settings.fetch_budget.saturating_sub(budget.remaining()),
            "triage complete"
        );
        results
    }

    async fn triage_batch(
        &self,
        entries: &[(&DiscoveredItem, Option<SourceType>)],
        system: String,
        budget: Arc<FetchBudget>,
    ) -> Vec<TriageVerdict> {
        let limits = batch_limits(&budget);
        let tool = FetchPageTool::new(Arc::clone(&self.crawl), budget);
        let request = MessageRequest {
            model: self.settings.model.clone(),
            max_tokens: MAX_RESPONSE_TOKENS,
            system: Some(system),
            messages: vec![Message::user_text(build_user_message(entries))],
            tools: vec![FetchPageTool::definition()],
            tool_choice: None,
        };

        let mut outcome = run_conversation(&self.llm, request.clone(), &limits, &tool).await;
        if let Err(ResearchError::RateLimited { .. }) = outcome {
            tracing::warn!(
                delay_secs = self.settings.rate_limit_delay.as_secs(),
                "triage rate limited, retrying batch once"
            );
            tokio::time::sleep(self.settings.rate_limit_delay).await;
            outcome = run_conversation(&self.llm, request, &limits, &tool).await;
        }

        match outcome {
            Ok(outcome) => {
                tracing::debug!(
                    turns = outcome.turns,
                    tool_calls = outcome.tool_calls,
                    forced_final = outcome.forced_final,
                    "triage batch finished"
                );
                parse_verdicts(&outcome.text, entries.len())
            }
            Err(e) => {
                tracing::warn!(items = entries.len(), error = %e, "triage batch failed, using fallback");
                vec![TriageVerdict::ambiguous(FALLBACK_REASON); entries.len()]
            }
        }
    }
}

/// System prompt describing the publication and the classification rules.
#[must_use]
pub fn build_system_prompt(publication: &PublicationContext, max_age_days: i64) -> String {
    let or_unspecified = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("Not specified")
            .to_string()
    };
    let industry = or_unspecified(&publication.industry_description);
    let personas = or_unspecified(&publication.reader_personas);

    format!(
        "You are a news triage agent for a trade publication. Your job is to classify \
discovered URLs as relevant news articles or not, and to extract publish dates.

## Publication Industry
{industry}

## Reader Personas
{personas}

## Classification Rules
- relevant_news: a news article, press release, or report relevant to the industry above, \
published within the last {max_age_days} days.
- maybe: possibly relevant, or not enough information to decide.
- not_news: navigation, event, subscription, author, category, tag, search, or login pages; \
content unrelated to the industry; or anything older than {max_age_days} days.

## Date Extraction
Extract the publish date from the URL path, the title or snippet, or fetched page content. \
Return it as YYYY-MM-DD, or null when unknown. Items older than {max_age_days} days are not_news.

## Instructions
Use the {FETCH_TOOL_NAME} tool only when the title and snippet are not enough to decide.
Respond with a JSON array containing one object per item, in input order, with the keys \
\"index\", \"verdict\", \"reasoning\", and \"published_date\". Output ONLY the JSON array."
    )
}

/// User message: the batch as a JSON array.
#[must_use]
pub fn build_user_message(entries: &[(&DiscoveredItem, Option<SourceType>)]) -> String {
    let rows: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(index, (item, source_type))| {
            json!({
                "index": index,
                "url": item.url,
                "title": item.title.as_deref().unwrap_or(""),
                "snippet": truncate_chars(item.snippet.as_deref().unwrap_or(""), MAX_SNIPPET_CHARS),
                "source_type": source_type.map_or("unknown", SourceType::as_str),
            })
        })
        .collect();
    Value::Array(rows).to_string()
}

/// Parse the model's answer into exactly `count` verdicts.
///
/// Unparseable answers yield the fallback verdict for every item; entries
/// with a missing index or unknown verdict yield the ambiguous verdict.
#[must_use]
pub fn parse_verdicts(text: &str, count: usize) -> Vec<TriageVerdict> {
    let fallback = || vec![TriageVerdict::ambiguous(FALLBACK_REASON); count];

    let text = text.trim();
    if text.is_empty() {
        return fallback();
    }
    let body = if text.contains("```") {
        FENCED_BLOCK
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map_or(text, |m| m.as_str().trim())
    } else {
        text
    };

    let parsed = serde_json::from_str::<Value>(body).ok().or_else(|| {
        JSON_ARRAY
            .find(body)
            .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
    });
    let Some(Value::Array(entries)) = parsed else {
        tracing::warn!("triage response was not a JSON array");
        return fallback();
    };

    let by_index: HashMap<u64, &Value> = entries
        .iter()
        .filter_map(|entry| Some((entry.get("index")?.as_u64()?, entry)))
        .collect();

    (0..count as u64)
        .map(|index| {
            let Some(entry) = by_index.get(&index) else {
                return TriageVerdict::ambiguous(NO_REASONING);
            };
            let verdict = entry
                .get("verdict")
                .and_then(Value::as_str)
                .and_then(Verdict::parse)
                .unwrap_or(Verdict::Ambiguous);
            let reasoning = entry
                .get("reasoning")
                .and_then(Value::as_str)
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(NO_REASONING)
                .to_string();
            let published_date = entry
                .get("published_date")
                .and_then(Value::as_str)
                .and_then(parse_loose_date);
            TriageVerdict {
                verdict,
                reasoning,
                published_date,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "triage_test.rs"]
mod tests;
