//! URL canonicalization and content addressing.
//!
//! Two raw URLs that differ only by tracking parameters, host case, fragment,
//! or a trailing slash normalize to the same string and so share a hash.

use std::fmt::Write as _;

use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::ResearchError;

const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "mc_cid",
    "mc_eid",
];

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS
        .iter()
        .any(|param| param.eq_ignore_ascii_case(key))
}

/// Canonicalize a URL for deduplication.
///
/// Lower-cases scheme and host, drops the fragment and tracking query
/// parameters, and strips trailing slashes from the path. Remaining query
/// pairs keep their order, blank values included.
///
/// # Errors
///
/// Returns [`ResearchError::InvalidUrl`] if the input is not an absolute URL
/// with a host.
pub fn normalize_url(raw: &str) -> Result<String, ResearchError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| ResearchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return Err(ResearchError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.set_query(None);
    if !kept.is_empty() {
        url.query_pairs_mut().extend_pairs(&kept);
    }

    let mut out = format!("{}://", url.scheme());
    if !url.username().is_empty() {
        out.push_str(url.username());
        if let Some(password) = url.password() {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }
    out.push_str(&host);
    if let Some(port) = url.port() {
        let _ = write!(out, ":{port}");
    }
    out.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }

    Ok(out)
}

/// Hex-encoded SHA-256 of an already normalized URL.
#[must_use]
pub fn url_hash(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Normalize and hash in one step. Returns `(normalized, hash)`.
///
/// # Errors
///
/// See [`normalize_url`].
pub fn fingerprint(raw: &str) -> Result<(String, String), ResearchError> {
    let normalized = normalize_url(raw)?;
    let hash = url_hash(&normalized);
    Ok((normalized, hash))
}

/// Host of a URL, lower-cased, without a leading `www.`.
#[must_use]
pub fn bare_host(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map_or(host.clone(), str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_fragment_and_trailing_slash() {
        let normalized =
            normalize_url("HTTPS://News.Example.COM/markets/wheat/?utm_source=x&id=5&FBCLID=abc#top")
                .unwrap();
        assert_eq!(normalized, "https://news.example.com/markets/wheat?id=5");
    }

    #[test]
    fn variants_hash_identically() {
        let a = fingerprint("https://example.com/story?utm_campaign=spring").unwrap();
        let b = fingerprint("https://EXAMPLE.com/story/").unwrap();
        let c = fingerprint("https://example.com/story#comments").unwrap();
        assert_eq!(a.1, b.1);
        assert_eq!(b.1, c.1);
    }

    #[test]
    fn root_path_loses_slash() {
        assert_eq!(
            normalize_url("https://example.com/").unwrap(),
            normalize_url("https://example.com").unwrap()
        );
        assert_eq!(normalize_url("https://example.com/").unwrap(), "https://example.com");
    }

    #[test]
    fn keeps_blank_values_and_order() {
        assert_eq!(
            normalize_url("https://example.com/a?b=2&empty=&ref=home&a=1").unwrap(),
            "https://example.com/a?b=2&empty=&a=1"
        );
    }

    #[test]
    fn keeps_non_default_port() {
        assert_eq!(
            normalize_url("http://example.com:8080/x/").unwrap(),
            "http://example.com:8080/x"
        );
        assert_eq!(
            normalize_url("https://example.com:443/x").unwrap(),
            "https://example.com/x"
        );
    }

    #[test]
    fn different_paths_hash_differently() {
        let a = fingerprint("https://example.com/a").unwrap();
        let b = fingerprint("https://example.com/b").unwrap();
        assert_ne!(a.1, b.1);
    }

    #[test]
    fn hash_is_sha256_hex() {
        let hash = url_hash("https://example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn relative_url_is_rejected() {
        assert!(matches!(
            normalize_url("/just/a/path"),
            Err(ResearchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn bare_host_strips_www() {
        assert_eq!(
            bare_host("https://WWW.Rival.example.com/x").as_deref(),
            Some("rival.example.com")
        );
        assert_eq!(bare_host("not a url"), None);
    }
}
