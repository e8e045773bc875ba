use serde::{Deserialize, Serialize};

use super::CodeRecord;

/// A catalogue code surfaced by the retrieval stage, carrying its fused
/// score and the provenance of which search legs produced it.
///
/// Invariant: at least one of `in_vector` / `in_fts` is set, and the
/// corresponding rank is present exactly when its flag is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    code: String,
    description: String,
    class_desc: String,
    group_desc: String,
    subdivision_desc: String,
    division_desc: String,
    class_exclusions: String,
    enriched_text: String,
    rrf_score: f32,
    in_vector: bool,
    in_fts: bool,
    vector_rank: Option<usize>,
    fts_rank: Option<usize>,
}

impl Candidate {
    pub fn new(
        record: CodeRecord,
        rrf_score: f32,
        vector_rank: Option<usize>,
        fts_rank: Option<usize>,
    ) -> Self {
        debug_assert!(
            vector_rank.is_some() || fts_rank.is_some(),
            "candidate must come from at least one search leg"
        );
        Self {
            code: record.code().to_string(),
            description: record.description().to_string(),
            class_desc: record.class_desc().to_string(),
            group_desc: record.group_desc().to_string(),
            subdivision_desc: record.subdivision_desc().to_string(),
            division_desc: record.division_desc().to_string(),
            class_exclusions: record.class_exclusions().to_string(),
            enriched_text: record.enriched_text().to_string(),
            rrf_score,
            in_vector: vector_rank.is_some(),
            in_fts: fts_rank.is_some(),
            vector_rank,
            fts_rank,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn class_desc(&self) -> &str {
        &self.class_desc
    }

    pub fn group_desc(&self) -> &str {
        &self.group_desc
    }

    pub fn subdivision_desc(&self) -> &str {
        &self.subdivision_desc
    }

    pub fn division_desc(&self) -> &str {
        &self.division_desc
    }

    pub fn class_exclusions(&self) -> &str {
        &self.class_exclusions
    }

    pub fn enriched_text(&self) -> &str {
        &self.enriched_text
    }

    pub fn rrf_score(&self) -> f32 {
        self.rrf_score
    }

    pub fn in_vector(&self) -> bool {
        self.in_vector
    }

    pub fn in_fts(&self) -> bool {
        self.in_fts
    }

    pub fn vector_rank(&self) -> Option<usize> {
        self.vector_rank
    }

    pub fn fts_rank(&self) -> Option<usize> {
        self.fts_rank
    }

    /// Which search legs surfaced this candidate: `"vector"`, `"fts"` or `"both"`.
    pub fn source_label(&self) -> &'static str {
        match (self.in_vector, self.in_fts) {
            (true, true) => "both",
            (true, false) => "vector",
            _ => "fts",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CodeRecord {
        CodeRecord::new("451100", "Motor vehicle repair").with_hierarchy(
            "Automotive repair",
            "Automotive repair and maintenance",
            "Repair and maintenance",
            "Other services",
        )
    }

    #[test]
    fn provenance_flags_match_ranks() {
        let c = Candidate::new(record(), 0.03, Some(1), None);
        assert!(c.in_vector());
        assert!(!c.in_fts());
        assert_eq!(c.vector_rank(), Some(1));
        assert_eq!(c.fts_rank(), None);
    }

    #[test]
    fn source_labels() {
        assert_eq!(Candidate::new(record(), 0.0, Some(1), None).source_label(), "vector");
        assert_eq!(Candidate::new(record(), 0.0, None, Some(2)).source_label(), "fts");
        assert_eq!(Candidate::new(record(), 0.0, Some(1), Some(2)).source_label(), "both");
    }

    #[test]
    fn record_fields_carried_over() {
        let c = Candidate::new(record(), 0.5, Some(1), Some(1));
        assert_eq!(c.code(), "451100");
        assert_eq!(c.description(), "Motor vehicle repair");
        assert_eq!(c.division_desc(), "Other services");
    }
}
