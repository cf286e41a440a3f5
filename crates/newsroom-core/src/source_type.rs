use serde::{Deserialize, Serialize};

/// Kind of place candidates are discovered from.
///
/// Stored as its snake_case name; rows carrying a name this enum does not
/// know are kept in the database and simply have no scraping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Feed,
    Site,
    KeywordSearch,
    VideoKeywordSearch,
    CompetitorSite,
    StructuredDocument,
    HouseContent,
}

impl SourceType {
    pub const ALL: [SourceType; 7] = [
        SourceType::Feed,
        SourceType::Site,
        SourceType::KeywordSearch,
        SourceType::VideoKeywordSearch,
        SourceType::CompetitorSite,
        SourceType::StructuredDocument,
        SourceType::HouseContent,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Feed => "feed",
            SourceType::Site => "site",
            SourceType::KeywordSearch => "keyword_search",
            SourceType::VideoKeywordSearch => "video_keyword_search",
            SourceType::CompetitorSite => "competitor_site",
            SourceType::StructuredDocument => "structured_document",
            SourceType::HouseContent => "house_content",
        }
    }

    /// Resolve a stored name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Items from these sources never go through LLM triage.
    #[must_use]
    pub fn skips_triage(self) -> bool {
        matches!(self, SourceType::StructuredDocument | SourceType::HouseContent)
    }

    /// Hosts of these sources are excluded from keyword-search results.
    #[must_use]
    pub fn is_exclusion_source(self) -> bool {
        matches!(self, SourceType::CompetitorSite | SourceType::HouseContent)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_variant() {
        for t in SourceType::ALL {
            assert_eq!(SourceType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            SourceType::parse(" Keyword_Search "),
            Some(SourceType::KeywordSearch)
        );
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(SourceType::parse("podcast"), None);
        assert_eq!(SourceType::parse(""), None);
    }

    #[test]
    fn triage_exemptions() {
        assert!(SourceType::StructuredDocument.skips_triage());
        assert!(SourceType::HouseContent.skips_triage());
        assert!(!SourceType::Feed.skips_triage());
        assert!(!SourceType::VideoKeywordSearch.skips_triage());
    }

    #[test]
    fn exclusion_sources() {
        assert!(SourceType::CompetitorSite.is_exclusion_source());
        assert!(SourceType::HouseContent.is_exclusion_source());
        assert!(!SourceType::Site.is_exclusion_source());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&SourceType::VideoKeywordSearch).unwrap();
        assert_eq!(json, "\"video_keyword_search\"");
    }
}
