use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub seed_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub http_timeout_secs: u64,
    pub http_user_agent: String,

    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,
    pub serpapi_api_key: Option<String>,
    pub serpapi_base_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub transcript_api_url: Option<String>,

    pub triage_model: String,
    pub analysis_model: String,
    pub triage_enabled: bool,
    pub triage_batch_size: usize,
    pub triage_fetch_budget: usize,
    pub triage_max_concurrency: usize,

    pub enrichment_min_score: f64,
    pub enrichment_max_per_run: usize,
    pub crawl_min_interval_ms: u64,
    pub max_item_age_days: i64,
    pub source_concurrency: usize,

    pub research_staleness_hours: i64,
    pub sweep_cron: String,
    pub research_max_retries: u32,
    pub research_retry_delay_secs: u64,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("seed_path", &self.seed_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_user_agent", &self.http_user_agent)
            .field(
                "firecrawl_api_key",
                &self.firecrawl_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("firecrawl_base_url", &self.firecrawl_base_url)
            .field(
                "serpapi_api_key",
                &self.serpapi_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("serpapi_base_url", &self.serpapi_base_url)
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("transcript_api_url", &self.transcript_api_url)
            .field("triage_model", &self.triage_model)
            .field("analysis_model", &self.analysis_model)
            .field("triage_enabled", &self.triage_enabled)
            .field("triage_batch_size", &self.triage_batch_size)
            .field("triage_fetch_budget", &self.triage_fetch_budget)
            .field("triage_max_concurrency", &self.triage_max_concurrency)
            .field("enrichment_min_score", &self.enrichment_min_score)
            .field("enrichment_max_per_run", &self.enrichment_max_per_run)
            .field("crawl_min_interval_ms", &self.crawl_min_interval_ms)
            .field("max_item_age_days", &self.max_item_age_days)
            .field("source_concurrency", &self.source_concurrency)
            .field("research_staleness_hours", &self.research_staleness_hours)
            .field("sweep_cron", &self.sweep_cron)
            .field("research_max_retries", &self.research_max_retries)
            .field(
                "research_retry_delay_secs",
                &self.research_retry_delay_secs,
            )
            .finish()
    }
}
