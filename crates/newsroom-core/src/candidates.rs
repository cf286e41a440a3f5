use serde::{Deserialize, Serialize};

/// Lifecycle state of a persisted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    New,
    Selected,
    Rejected,
    Processed,
}

impl CandidateStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateStatus::New => "new",
            CandidateStatus::Selected => "selected",
            CandidateStatus::Rejected => "rejected",
            CandidateStatus::Processed => "processed",
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(CandidateStatus::New),
            "selected" => Ok(CandidateStatus::Selected),
            "rejected" => Ok(CandidateStatus::Rejected),
            "processed" => Ok(CandidateStatus::Processed),
            other => Err(format!(
                "invalid candidate status '{other}'; expected new, selected, rejected, or processed"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_accepts_all_states() {
        for status in [
            CandidateStatus::New,
            CandidateStatus::Selected,
            CandidateStatus::Rejected,
            CandidateStatus::Processed,
        ] {
            assert_eq!(status.as_str().parse::<CandidateStatus>(), Ok(status));
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "archived".parse::<CandidateStatus>().unwrap_err();
        assert!(err.contains("archived"));
    }
}
