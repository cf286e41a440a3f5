use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rate limited the request")]
    RateLimited {
        service: &'static str,
        retry_after_secs: Option<u64>,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to deserialize {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("feed parse error: {0}")]
    Feed(String),

    #[error("document extraction error: {0}")]
    Document(String),

    #[error("LLM response error: {0}")]
    Llm(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("publication {0} not found")]
    PublicationNotFound(i64),

    #[error("publication {0} is inactive")]
    PublicationInactive(i64),
}

impl ResearchError {
    /// Whether a later attempt of the whole operation could succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ResearchError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ResearchError::RateLimited { .. } | ResearchError::Store(_) => true,
            ResearchError::UnexpectedStatus { status, .. } => *status >= 500,
            ResearchError::Deserialize { .. }
            | ResearchError::MissingConfig(_)
            | ResearchError::InvalidUrl { .. }
            | ResearchError::Feed(_)
            | ResearchError::Document(_)
            | ResearchError::Llm(_)
            | ResearchError::PublicationNotFound(_)
            | ResearchError::PublicationInactive(_) => false,
        }
    }
}

impl From<newsroom_db::DbError> for ResearchError {
    fn from(err: newsroom_db::DbError) -> Self {
        ResearchError::Store(err.to_string())
    }
}
