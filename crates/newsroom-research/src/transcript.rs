//! Video transcript service client and its circuit breaker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ResearchError;
use crate::http::{check_status, endpoint, parse_base_url, read_json};

const SERVICE: &str = "transcript service";

static IP_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)blocking|\bip\b").expect("valid regex"));

/// One-way breaker: once the transcript service reports an IP-level block,
/// transcript fetches are skipped until [`TranscriptBreaker::reset`].
#[derive(Debug, Default)]
pub struct TranscriptBreaker {
    tripped: AtomicBool,
}

impl TranscriptBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    pub fn trip(&self) {
        self.tripped.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.tripped.store(false, Ordering::SeqCst);
    }

    /// Trip when `message` describes an IP block. Returns whether it did.
    pub fn observe_failure(&self, message: &str) -> bool {
        if IP_BLOCK.is_match(message) {
            self.trip();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptSnippet {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    snippets: Vec<TranscriptSnippet>,
}

pub struct TranscriptClient {
    http: Client,
    base_url: Option<Url>,
}

impl TranscriptClient {
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidUrl`] if `base_url` is given but invalid.
    pub fn new(http: Client, base_url: Option<&str>) -> Result<Self, ResearchError> {
        Ok(Self {
            http,
            base_url: base_url.map(parse_base_url).transpose()?,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Transcript text for `video_id`, snippets joined by spaces.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::MissingConfig`] without a service URL, or any
    /// transport, status, or decoding error.
    pub async fn fetch(&self, video_id: &str) -> Result<String, ResearchError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| ResearchError::MissingConfig("TRANSCRIPT_API_URL".to_string()))?;
        let url = endpoint(base, &format!("transcripts/{video_id}"))?;

        let response = self.http.get(url).send().await?;
        let response = check_status(SERVICE, response).await?;
        let transcript: TranscriptResponse = read_json(response, "transcript").await?;

        Ok(transcript
            .snippets
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }
}
