use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::source_type::SourceType;
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSeed {
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationSeed {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub industry_description: Option<String>,
    #[serde(default)]
    pub reader_personas: Option<String>,
    #[serde(default)]
    pub publication_domain: Option<String>,
    #[serde(default)]
    pub review_mode: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sources: Vec<SourceSeed>,
}

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub publications: Vec<PublicationSeed>,
}

fn default_true() -> bool {
    true
}

/// Load and validate publications and their sources from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_seed_file(path: &Path) -> Result<SeedFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_seed_file(&content)
}

/// Parse and validate seed YAML already held in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_seed_file(content: &str) -> Result<SeedFile, ConfigError> {
    let seed: SeedFile = serde_yaml::from_str(content)?;
    validate_seed(&seed)?;
    Ok(seed)
}

fn validate_seed(seed: &SeedFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for publication in &seed.publications {
        if publication.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "publication name must be non-empty".to_string(),
            ));
        }

        let slug = publication.slug.trim();
        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "publication '{}' has invalid slug '{}'",
                publication.name, publication.slug
            )));
        }
        if !seen_slugs.insert(slug.to_string()) {
            return Err(ConfigError::Validation(format!(
                "duplicate publication slug: '{slug}'"
            )));
        }

        let mut seen_sources = HashSet::new();
        for source in &publication.sources {
            if !seen_sources.insert(source.name.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "publication '{slug}' has duplicate source name '{}'",
                    source.name
                )));
            }
            if !source.url.starts_with("http://") && !source.url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "source '{}' url must be http(s): '{}'",
                    source.name, source.url
                )));
            }
            if let Some(config) = &source.config {
                if !config.is_object() {
                    return Err(ConfigError::Validation(format!(
                        "source '{}' config must be a mapping",
                        source.name
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "seed_test.rs"]
mod tests;
