use serde::Serialize;

/// Counters reported by one research run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub sources_scanned: usize,
    pub total_discovered: usize,
    pub new_candidates: usize,
    pub skipped_duplicates: usize,
    pub skipped_excluded: usize,
    pub enriched: usize,
    pub enrichment_skipped: usize,
    pub enrichment_failed: usize,
    pub enrichment_budget_exhausted: usize,
    pub triage_relevant: usize,
    pub triage_maybe: usize,
    pub triage_rejected: usize,
    pub triage_skipped: usize,
    pub errors: usize,
}
