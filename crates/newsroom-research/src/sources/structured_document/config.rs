use serde::Deserialize;
use serde_json::Value;

const DEFAULT_LOOKBACK_MONTHS: u32 = 2;
const DEFAULT_MAX_ANGLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    UrlPattern,
    LandingPage,
    JsonApi,
}

/// Summary of the last analysed document, fed into the next analysis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreviousReport {
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub report_summary: Option<String>,
    #[serde(default)]
    pub key_figures: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentSourceConfig {
    pub discovery_mode: DiscoveryMode,
    pub document_type: String,
    pub report_name: String,
    pub publisher: String,
    pub cadence: String,
    pub analysis_prompt: String,

    #[serde(default)]
    pub url_pattern: Option<String>,
    #[serde(default = "default_lookback_months")]
    pub lookback_months: u32,
    #[serde(default)]
    pub landing_page_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub document_url_path: Option<String>,
    #[serde(default)]
    pub document_date_path: Option<String>,
    #[serde(default = "default_max_angles")]
    pub max_angles: usize,
    #[serde(default)]
    pub previous_report_data: Option<PreviousReport>,
}

fn default_lookback_months() -> u32 {
    DEFAULT_LOOKBACK_MONTHS
}

fn default_max_angles() -> usize {
    DEFAULT_MAX_ANGLES
}

impl DocumentSourceConfig {
    /// Parse and validate a source's JSON config.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn from_value(config: &Value) -> Result<Self, String> {
        let parsed: Self = serde_json::from_value(config.clone()).map_err(|e| e.to_string())?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("document_type", &self.document_type),
            ("report_name", &self.report_name),
            ("publisher", &self.publisher),
            ("cadence", &self.cadence),
            ("analysis_prompt", &self.analysis_prompt),
        ] {
            if value.trim().is_empty() {
                return Err(format!("'{field}' must not be blank"));
            }
        }

        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match self.discovery_mode {
            DiscoveryMode::UrlPattern if !present(&self.url_pattern) => {
                Err("url_pattern mode requires 'url_pattern'".to_string())
            }
            DiscoveryMode::JsonApi if !present(&self.api_url) => {
                Err("json_api mode requires 'api_url'".to_string())
            }
            DiscoveryMode::JsonApi if !present(&self.document_url_path) => {
                Err("json_api mode requires 'document_url_path'".to_string())
            }
            _ => Ok(()),
        }
    }
}
