//! Shared domain vocabulary and configuration for the newsroom workspace.

pub mod app_config;
pub mod candidates;
pub mod config;
pub mod seed;
pub mod source_type;

pub use app_config::{AppConfig, Environment};
pub use candidates::CandidateStatus;
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use seed::{load_seed_file, PublicationSeed, SeedFile, SourceSeed};
pub use source_type::SourceType;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read seed file {path}: {source}")]
    SeedFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file: {0}")]
    SeedFileParse(#[from] serde_yaml::Error),

    #[error("seed validation failed: {0}")]
    Validation(String),
}
