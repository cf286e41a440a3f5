//! Shared HTTP plumbing for the external service clients.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};

use crate::error::ResearchError;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Build the `reqwest::Client` every service client shares.
///
/// # Errors
///
/// Returns [`ResearchError::Http`] if the client cannot be constructed.
pub fn build_http_client(timeout_secs: u64, user_agent: &str) -> Result<Client, ResearchError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Parse a service base URL, normalising it to exactly one trailing slash so
/// `join` appends to the path instead of replacing its last segment.
///
/// # Errors
///
/// Returns [`ResearchError::InvalidUrl`] if `base_url` does not parse.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ResearchError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| ResearchError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ResearchError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ResearchError::InvalidUrl {
            url: format!("{base}{path}"),
            reason: e.to_string(),
        })
}

/// Seconds from a `Retry-After` header given as an integer.
pub(crate) fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Pass successful responses through; map 429 to [`ResearchError::RateLimited`]
/// and other failures to [`ResearchError::UnexpectedStatus`].
pub(crate) async fn check_status(
    service: &'static str,
    response: Response,
) -> Result<Response, ResearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ResearchError::RateLimited {
            service,
            retry_after_secs: retry_after_secs(&response),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(ResearchError::UnexpectedStatus {
        service,
        status: status.as_u16(),
        body: truncate_chars(&body, MAX_ERROR_BODY_CHARS).to_string(),
    })
}

/// Decode a JSON body, naming `context` in the error.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, ResearchError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ResearchError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

/// Longest prefix of `text` with at most `max` characters.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
