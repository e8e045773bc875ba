use std::collections::HashMap;

/// Smoothing constant for Reciprocal Rank Fusion.
/// Higher values reduce the weight difference between high and low-ranked items.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// One fused code with its cumulative score and per-leg provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEntry {
    code: String,
    score: f32,
    vector_rank: Option<usize>,
    fts_rank: Option<usize>,
}

impl FusedEntry {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn in_vector(&self) -> bool {
        self.vector_rank.is_some()
    }

    pub fn in_fts(&self) -> bool {
        self.fts_rank.is_some()
    }

    pub fn vector_rank(&self) -> Option<usize> {
        self.vector_rank
    }

    pub fn fts_rank(&self) -> Option<usize> {
        self.fts_rank
    }

    fn best_rank(&self) -> usize {
        self.vector_rank
            .unwrap_or(usize::MAX)
            .min(self.fts_rank.unwrap_or(usize::MAX))
    }
}

/// Merge two ranked `(code, rank)` lists using Reciprocal Rank Fusion.
///
/// Each occurrence of a code at rank `r` contributes `1 / (k + r)`; a code
/// present in both lists receives both contributions. Output is ordered by
/// fused score descending, ties broken by best per-leg rank ascending then
/// code lexicographically, so the ordering is reproducible regardless of
/// map iteration order.
///
/// A duplicated code within one list keeps its best (smallest) rank rather
/// than summing. Panics if `k` is not positive; settings validation keeps
/// that out of reach at runtime.
pub fn rrf_fuse(
    vector: &[(String, usize)],
    fts: &[(String, usize)],
    k: f32,
) -> Vec<FusedEntry> {
    assert!(k > 0.0, "RRF smoothing constant must be positive");

    let vector_ranks = best_ranks(vector);
    let fts_ranks = best_ranks(fts);

    let mut merged: HashMap<&str, (Option<usize>, Option<usize>)> = HashMap::new();
    for (&code, &rank) in &vector_ranks {
        merged.entry(code).or_insert((None, None)).0 = Some(rank);
    }
    for (&code, &rank) in &fts_ranks {
        merged.entry(code).or_insert((None, None)).1 = Some(rank);
    }

    let mut fused: Vec<FusedEntry> = merged
        .into_iter()
        .map(|(code, (vector_rank, fts_rank))| {
            let mut score = 0.0;
            if let Some(r) = vector_rank {
                score += 1.0 / (k + r as f32);
            }
            if let Some(r) = fts_rank {
                score += 1.0 / (k + r as f32);
            }
            FusedEntry {
                code: code.to_string(),
                score,
                vector_rank,
                fts_rank,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank().cmp(&b.best_rank()))
            .then_with(|| a.code.cmp(&b.code))
    });
    fused
}

fn best_ranks(list: &[(String, usize)]) -> HashMap<&str, usize> {
    let mut ranks: HashMap<&str, usize> = HashMap::new();
    for (code, rank) in list {
        ranks
            .entry(code.as_str())
            .and_modify(|existing| *existing = (*existing).min(*rank))
            .or_insert(*rank);
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(codes: &[&str]) -> Vec<(String, usize)> {
        codes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.to_string(), i + 1))
            .collect()
    }

    #[test]
    fn cross_system_agreement_wins() {
        let vector = ranked(&["A", "B", "C"]);
        let fts = ranked(&["A", "D", "B"]);

        let fused = rrf_fuse(&vector, &fts, 60.0);
        let order: Vec<&str> = fused.iter().map(|e| e.code()).collect();

        assert_eq!(order, vec!["A", "B", "D", "C"]);
        assert!((fused[0].score() - (1.0 / 61.0 + 1.0 / 61.0)).abs() < 1e-6);
        assert!((fused[1].score() - (1.0 / 62.0 + 1.0 / 63.0)).abs() < 1e-6);
        assert!((fused[2].score() - 1.0 / 62.0).abs() < 1e-6);
        assert!((fused[3].score() - 1.0 / 63.0).abs() < 1e-6);
    }

    #[test]
    fn provenance_tracked_per_leg() {
        let fused = rrf_fuse(&ranked(&["A", "B"]), &ranked(&["B", "C"]), 60.0);
        let by_code: std::collections::HashMap<&str, &FusedEntry> =
            fused.iter().map(|e| (e.code(), e)).collect();

        assert!(by_code["A"].in_vector() && !by_code["A"].in_fts());
        assert!(by_code["B"].in_vector() && by_code["B"].in_fts());
        assert_eq!(by_code["B"].vector_rank(), Some(2));
        assert_eq!(by_code["B"].fts_rank(), Some(1));
        assert!(!by_code["C"].in_vector() && by_code["C"].in_fts());
    }

    #[test]
    fn both_empty_yields_empty() {
        assert!(rrf_fuse(&[], &[], 60.0).is_empty());
    }

    #[test]
    fn single_leg_only() {
        let fused = rrf_fuse(&ranked(&["A", "B"]), &[], 60.0);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].code(), "A");
        assert!((fused[0].score() - 1.0 / 61.0).abs() < 1e-6);
        assert!(fused.iter().all(|e| !e.in_fts()));
    }

    #[test]
    fn single_code_in_both_legs() {
        let fused = rrf_fuse(&ranked(&["X"]), &ranked(&["X"]), 60.0);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].vector_rank(), Some(1));
        assert_eq!(fused[0].fts_rank(), Some(1));
        assert!((fused[0].score() - 2.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn duplicate_within_one_list_keeps_best_rank() {
        let vector = vec![
            ("A".to_string(), 1),
            ("B".to_string(), 2),
            ("A".to_string(), 3),
        ];
        let fused = rrf_fuse(&vector, &[], 60.0);
        let a = fused.iter().find(|e| e.code() == "A").unwrap();
        assert_eq!(a.vector_rank(), Some(1));
        assert!((a.score() - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn ties_break_by_best_rank_then_code() {
        // B at vector rank 1 and A at fts rank 1 score identically;
        // equal best ranks fall through to the lexicographic key.
        let fused = rrf_fuse(&ranked(&["B"]), &ranked(&["A"]), 60.0);
        let order: Vec<&str> = fused.iter().map(|e| e.code()).collect();
        assert_eq!(order, vec!["A", "B"]);
    }

    #[test]
    fn ordering_is_reproducible() {
        let vector = ranked(&["E", "A", "C", "B", "D"]);
        let fts = ranked(&["B", "E", "A", "F", "C"]);

        let first = rrf_fuse(&vector, &fts, 60.0);
        for _ in 0..20 {
            assert_eq!(rrf_fuse(&vector, &fts, 60.0), first);
        }
    }

    #[test]
    #[should_panic(expected = "positive")]
    fn non_positive_k_is_a_programming_error() {
        rrf_fuse(&[], &[], 0.0);
    }
}
