//! Finding document URLs for a structured-document source.

use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use super::config::{DiscoveryMode, DocumentSourceConfig};
use crate::crawl::CrawlClient;
use crate::error::ResearchError;
use crate::http::{check_status, read_json};

const HEAD_TIMEOUT: Duration = Duration::from_secs(10);
const API_TIMEOUT: Duration = Duration::from_secs(30);
const MONTH_PLACEHOLDER: &str = "{MMYY}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDocument {
    pub url: String,
    pub report_date: Option<String>,
}

/// One candidate URL per month of the lookback window, newest first, with
/// the `YYYY-MM` report date of each.
#[must_use]
pub fn pattern_candidates(pattern: &str, lookback_months: u32, now: DateTime<Utc>) -> Vec<(String, String)> {
    let Some(first_of_month) = NaiveDate::from_ymd_opt(now.year(), now.month(), 1) else {
        return Vec::new();
    };
    (0..lookback_months)
        .filter_map(|back| first_of_month.checked_sub_months(Months::new(back)))
        .map(|month| {
            let mmyy = month.format("%m%y").to_string();
            (
                pattern.replace(MONTH_PLACEHOLDER, &mmyy),
                month.format("%Y-%m").to_string(),
            )
        })
        .collect()
}

/// Values at a dotted path, where `*` visits every array element.
#[must_use]
pub fn select_path<'a>(value: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![value];
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current
            .into_iter()
            .flat_map(|node| -> Vec<&'a Value> {
                if segment == "*" {
                    match node {
                        Value::Array(items) => items.iter().collect(),
                        Value::Object(map) => map.values().collect(),
                        _ => Vec::new(),
                    }
                } else if let Ok(index) = segment.parse::<usize>() {
                    node.get(index).into_iter().collect()
                } else {
                    node.get(segment).into_iter().collect()
                }
            })
            .collect();
    }
    current
}

pub struct DocumentDiscovery<'a> {
    pub http: &'a Client,
    pub crawl: &'a CrawlClient,
}

impl DocumentDiscovery<'_> {
    pub async fn discover(
        &self,
        config: &DocumentSourceConfig,
        source_url: &str,
        now: DateTime<Utc>,
    ) -> Vec<DiscoveredDocument> {
        let result = match config.discovery_mode {
            DiscoveryMode::UrlPattern => Ok(self.via_pattern(config, now).await),
            DiscoveryMode::LandingPage => self.via_landing_page(config, source_url).await,
            DiscoveryMode::JsonApi => self.via_json_api(config).await,
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(report = %config.report_name, error = %e, "document discovery failed");
            Vec::new()
        })
    }

    async fn via_pattern(&self, config: &DocumentSourceConfig, now: DateTime<Utc>) -> Vec<DiscoveredDocument> {
        let Some(pattern) = config.url_pattern.as_deref() else {
            return Vec::new();
        };
        let mut documents = Vec::new();
        for (url, report_date) in pattern_candidates(pattern, config.lookback_months, now) {
            match self.http.head(&url).timeout(HEAD_TIMEOUT).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    if content_type.contains("pdf") || url.to_ascii_lowercase().ends_with(".pdf") {
                        tracing::info!(url = %url, "found report document");
                        documents.push(DiscoveredDocument {
                            url,
                            report_date: Some(report_date),
                        });
                    } else {
                        tracing::debug!(url = %url, content_type = %content_type, "report URL is not a PDF");
                    }
                }
                Ok(response) => {
                    tracing::debug!(url = %url, status = response.status().as_u16(), "report URL missing");
                }
                Err(e) => tracing::debug!(url = %url, error = %e, "report HEAD check failed"),
            }
        }
        documents
    }

    async fn via_landing_page(
        &self,
        config: &DocumentSourceConfig,
        source_url: &str,
    ) -> Result<Vec<DiscoveredDocument>, ResearchError> {
        let landing = config
            .landing_page_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(source_url);
        if !self.crawl.is_configured() {
            return Err(ResearchError::MissingConfig("FIRECRAWL_API_KEY".to_string()));
        }
        let links = self.crawl.scrape_links(landing).await?;
        Ok(links
            .into_iter()
            .filter(|link| link.to_ascii_lowercase().ends_with(".pdf"))
            .map(|url| DiscoveredDocument {
                url,
                report_date: None,
            })
            .collect())
    }

    async fn via_json_api(&self, config: &DocumentSourceConfig) -> Result<Vec<DiscoveredDocument>, ResearchError> {
        let (Some(api_url), Some(url_path)) = (config.api_url.as_deref(), config.document_url_path.as_deref()) else {
            return Ok(Vec::new());
        };
        let base = Url::parse(api_url).map_err(|e| ResearchError::InvalidUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self.http.get(base.clone()).timeout(API_TIMEOUT).send().await?;
        let response = check_status("document API", response).await?;
        let body: Value = read_json(response, "document API").await?;

        let dates: Vec<Option<String>> = config
            .document_date_path
            .as_deref()
            .map(|path| {
                select_path(&body, path)
                    .into_iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(select_path(&body, url_path)
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| {
                let raw = value.as_str()?;
                let url = base.join(raw).ok()?;
                Some(DiscoveredDocument {
                    url: url.to_string(),
                    report_date: dates.get(idx).cloned().flatten(),
                })
            })
            .collect())
    }
}
