use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can pass a `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
#[allow(clippy::too_many_lines)]
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty strings count as unset for optional secrets.
    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = parse_usize(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() {
            return Err(invalid(var, "must be a finite number".to_string()));
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("NEWSROOM_ENV", "development"))?;
    let bind_addr = parse_addr("NEWSROOM_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("NEWSROOM_LOG_LEVEL", "info");
    let seed_path = PathBuf::from(or_default(
        "NEWSROOM_SEED_PATH",
        "./config/publications.yaml",
    ));

    let db_max_connections = parse_u32("NEWSROOM_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("NEWSROOM_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("NEWSROOM_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "NEWSROOM_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds NEWSROOM_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    let http_timeout_secs = parse_u64("NEWSROOM_HTTP_TIMEOUT_SECS", "30")?;
    let http_user_agent = or_default(
        "NEWSROOM_HTTP_USER_AGENT",
        "newsroom/0.1 (candidate-discovery)",
    );

    let firecrawl_api_key = optional("FIRECRAWL_API_KEY");
    let firecrawl_base_url = or_default("FIRECRAWL_BASE_URL", "https://api.firecrawl.dev");
    let serpapi_api_key = optional("SERPAPI_API_KEY");
    let serpapi_base_url = or_default("SERPAPI_BASE_URL", "https://serpapi.com");
    let anthropic_api_key = optional("ANTHROPIC_API_KEY");
    let anthropic_base_url = or_default("ANTHROPIC_BASE_URL", "https://api.anthropic.com");
    let transcript_api_url = optional("TRANSCRIPT_API_URL");

    let triage_model = or_default("NEWSROOM_TRIAGE_MODEL", "claude-haiku-4-5");
    let analysis_model = or_default("NEWSROOM_ANALYSIS_MODEL", "claude-sonnet-4-5");
    let triage_enabled = parse_bool("NEWSROOM_TRIAGE_ENABLED", "true")?;
    let triage_batch_size = parse_positive("NEWSROOM_TRIAGE_BATCH_SIZE", "40")?;
    let triage_fetch_budget = parse_usize("NEWSROOM_TRIAGE_FETCH_BUDGET", "5")?;
    let triage_max_concurrency = parse_positive("NEWSROOM_TRIAGE_MAX_CONCURRENCY", "2")?;

    let enrichment_min_score = parse_f64("NEWSROOM_ENRICHMENT_MIN_SCORE", "25.0")?;
    let enrichment_max_per_run = parse_usize("NEWSROOM_ENRICHMENT_MAX_PER_RUN", "50")?;
    let crawl_min_interval_ms = parse_u64("NEWSROOM_CRAWL_MIN_INTERVAL_MS", "6000")?;
    let max_item_age_days = parse_i64("NEWSROOM_MAX_ITEM_AGE_DAYS", "90")?;
    let source_concurrency = parse_positive("NEWSROOM_SOURCE_CONCURRENCY", "4")?;

    let research_staleness_hours = parse_i64("NEWSROOM_RESEARCH_STALENESS_HOURS", "24")?;
    let sweep_cron = or_default("NEWSROOM_SWEEP_CRON", "0 0 * * * *");
    let research_max_retries = parse_u32("NEWSROOM_RESEARCH_MAX_RETRIES", "2")?;
    let research_retry_delay_secs = parse_u64("NEWSROOM_RESEARCH_RETRY_DELAY_SECS", "60")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        seed_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_user_agent,
        firecrawl_api_key,
        firecrawl_base_url,
        serpapi_api_key,
        serpapi_base_url,
        anthropic_api_key,
        anthropic_base_url,
        transcript_api_url,
        triage_model,
        analysis_model,
        triage_enabled,
        triage_batch_size,
        triage_fetch_budget,
        triage_max_concurrency,
        enrichment_min_score,
        enrichment_max_per_run,
        crawl_min_interval_ms,
        max_item_age_days,
        source_concurrency,
        research_staleness_hours,
        sweep_cron,
        research_max_retries,
        research_retry_delay_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "NEWSROOM_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
