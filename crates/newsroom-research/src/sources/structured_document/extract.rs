//! Document download and text extraction.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;

use crate::error::ResearchError;
use crate::http::{check_status, truncate_chars};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const MIN_TEXT_CHARS: usize = 100;
pub const MAX_TEXT_CHARS: usize = 150_000;
const TRUNCATION_MARKER: &str = "\n\n[... document truncated ...]";

/// Two or more spaces, or a tab, between cells of a table-like line.
static CELL_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+| {2,}").expect("valid regex"));

#[derive(Debug)]
pub struct DownloadedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl DownloadedDocument {
    #[must_use]
    pub fn is_pdf(&self, url: &str) -> bool {
        self.bytes.starts_with(b"%PDF")
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"))
            || url.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// # Errors
///
/// Returns a transport or status error.
pub async fn download(http: &Client, url: &str) -> Result<DownloadedDocument, ResearchError> {
    let response = http.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
    let response = check_status("document host", response).await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?.to_vec();
    Ok(DownloadedDocument {
        bytes,
        content_type,
    })
}

/// Text of a downloaded document: PDF text extraction, or the body itself.
/// Table-like rows are flattened to `a | b | c`.
///
/// # Errors
///
/// Returns [`ResearchError::Document`] when PDF extraction fails.
pub async fn extract_text(document: DownloadedDocument, url: &str) -> Result<String, ResearchError> {
    let raw = if document.is_pdf(url) {
        let bytes = document.bytes;
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ResearchError::Document(format!("extraction task failed: {e}")))?
            .map_err(|e| ResearchError::Document(e.to_string()))?
    } else {
        String::from_utf8_lossy(&document.bytes).into_owned()
    };
    Ok(flatten_rows(&raw))
}

/// Rewrite lines with several whitespace-separated cells as `a | b | c`.
#[must_use]
pub fn flatten_rows(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim();
            let cells: Vec<&str> = CELL_GAP
                .split(trimmed)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if cells.len() >= 2 {
                cells.join(" | ")
            } else {
                trimmed.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `None` when the text is too short to analyse; otherwise the text bounded
/// to [`MAX_TEXT_CHARS`] with a truncation marker.
#[must_use]
pub fn prepare_for_analysis(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_CHARS {
        return None;
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        Some(format!("{}{TRUNCATION_MARKER}", truncate_chars(trimmed, MAX_TEXT_CHARS)))
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_table_rows() {
        let text = "Grain Stocks Report\nCommodity    Sept 1    Change\nWheat\t1,980\t+4%\n  ";
        assert_eq!(
            flatten_rows(text),
            "Grain Stocks Report\nCommodity | Sept 1 | Change\nWheat | 1,980 | +4%\n"
        );
    }

    #[test]
    fn short_text_is_rejected() {
        assert_eq!(prepare_for_analysis("too short"), None);
        let ok = "x".repeat(MIN_TEXT_CHARS);
        assert_eq!(prepare_for_analysis(&ok).as_deref(), Some(ok.as_str()));
    }

    #[test]
    fn long_text_is_truncated_with_marker() {
        let long = "y".repeat(MAX_TEXT_CHARS + 10);
        let prepared = prepare_for_analysis(&long).unwrap();
        assert!(prepared.ends_with(TRUNCATION_MARKER));
        assert_eq!(prepared.chars().count(), MAX_TEXT_CHARS + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn pdf_detection() {
        let doc = |bytes: &[u8], ct: Option<&str>| DownloadedDocument {
            bytes: bytes.to_vec(),
            content_type: ct.map(str::to_string),
        };
        assert!(doc(b"%PDF-1.7", None).is_pdf("https://a.gov/r"));
        assert!(doc(b"", Some("application/pdf")).is_pdf("https://a.gov/r"));
        assert!(doc(b"", None).is_pdf("https://a.gov/r.PDF"));
        assert!(!doc(b"plain", Some("text/plain")).is_pdf("https://a.gov/r"));
    }

    #[tokio::test]
    async fn text_bodies_pass_through() {
        let document = DownloadedDocument {
            bytes: b"Wheat  1,980  +4%".to_vec(),
            content_type: Some("text/plain".into()),
        };
        assert_eq!(
            extract_text(document, "https://a.gov/r.txt").await.unwrap(),
            "Wheat | 1,980 | +4%"
        );
    }
}
