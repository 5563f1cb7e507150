//! Ranker / target selector
//!
//! Orders scored candidates so the survivor comes first:
//! 1. Higher quality score
//! 2. Older creation date
//! 3. Original input order (stable sort)
//!
//! Pure: no I/O, deterministic for a given input.

use crate::types::{Candidate, RecordId};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Candidates in rank order; the first one is the merge target
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSet {
    ordered: Vec<Candidate>,
}

impl RankedSet {
    /// All candidates in rank order
    pub fn candidates(&self) -> &[Candidate] {
        &self.ordered
    }

    /// Surviving record
    pub fn target(&self) -> Option<&Candidate> {
        self.ordered.first()
    }

    /// Records to merge into the target, in rank order
    ///
    /// Never contains the target's own id, and each id appears at most once:
    /// a search can return the same record twice, and merging a record into
    /// itself is rejected by the store.
    pub fn sources(&self) -> Vec<&Candidate> {
        let Some(target) = self.target() else {
            return Vec::new();
        };

        let mut seen: HashSet<&RecordId> = HashSet::new();
        seen.insert(&target.id);

        let mut sources = Vec::with_capacity(self.ordered.len() - 1);
        for candidate in &self.ordered[1..] {
            if seen.insert(&candidate.id) {
                sources.push(candidate);
            }
        }
        sources
    }
}

/// Rank candidates (stable for equal keys)
pub fn rank(mut candidates: Vec<Candidate>) -> RankedSet {
    candidates.sort_by(compare_rank);
    RankedSet {
        ordered: candidates,
    }
}

/// Sort key `(-quality_score, created_at)`
pub fn compare_rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.quality_score
        .partial_cmp(&a.quality_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.created_at.cmp(&b.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DedupKey;
    use chrono::{DateTime, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn candidate(id: &str, score: f64, created: DateTime<Utc>) -> Candidate {
        Candidate::new(
            RecordId::from(id),
            DedupKey::parse(Some("+441234567890")).unwrap(),
            created,
            score,
        )
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_score_then_age_ordering() {
        let ranked = rank(vec![
            candidate("A", 90.0, date(2023, 1, 1)),
            candidate("B", 90.0, date(2022, 6, 1)),
            candidate("C", 40.0, date(2021, 1, 1)),
        ]);

        assert_eq!(ids(ranked.candidates()), vec!["B", "A", "C"]);
        assert_eq!(ranked.target().unwrap().id.as_str(), "B");

        let sources: Vec<&str> = ranked.sources().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(sources, vec!["A", "C"]);
    }

    #[test]
    fn test_adjacent_pairs_respect_order() {
        let ranked = rank(vec![
            candidate("1", 0.2, date(2020, 5, 1)),
            candidate("2", 0.9, date(2021, 1, 1)),
            candidate("3", 0.9, date(2019, 1, 1)),
            candidate("4", 0.0, date(2018, 1, 1)),
            candidate("5", 0.2, date(2020, 1, 1)),
            candidate("6", 0.9, date(2019, 1, 1)),
        ]);

        for pair in ranked.candidates().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.quality_score > b.quality_score
                    || (a.quality_score == b.quality_score && a.created_at <= b.created_at),
                "{} must rank before {}",
                a.id,
                b.id
            );
        }
    }

    #[test]
    fn test_full_ties_keep_input_order() {
        let created = date(2022, 1, 1);
        let ranked = rank(vec![
            candidate("x", 0.5, created),
            candidate("y", 0.5, created),
            candidate("z", 0.5, created),
        ]);

        assert_eq!(ids(ranked.candidates()), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_reranking_is_idempotent() {
        let ranked = rank(vec![
            candidate("a", 0.1, date(2022, 1, 1)),
            candidate("b", 0.7, date(2023, 1, 1)),
            candidate("c", 0.7, date(2023, 1, 1)),
            candidate("d", 0.7, date(2020, 1, 1)),
        ]);

        let reranked = rank(ranked.candidates().to_vec());
        assert_eq!(ranked, reranked);
    }

    #[test]
    fn test_target_duplicate_excluded_from_sources() {
        let ranked = rank(vec![
            candidate("T", 0.9, date(2020, 1, 1)),
            candidate("S", 0.5, date(2020, 1, 1)),
            candidate("T", 0.9, date(2020, 1, 1)),
        ]);

        assert_eq!(ranked.target().unwrap().id.as_str(), "T");
        let sources: Vec<&str> = ranked.sources().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(sources, vec!["S"]);
    }

    #[test]
    fn test_only_self_matches_yields_no_sources() {
        let ranked = rank(vec![
            candidate("T", 0.9, date(2020, 1, 1)),
            candidate("T", 0.9, date(2020, 1, 1)),
        ]);

        assert!(ranked.sources().is_empty());
    }

    #[test]
    fn test_repeated_source_merged_once() {
        let ranked = rank(vec![
            candidate("T", 0.9, date(2020, 1, 1)),
            candidate("S", 0.5, date(2020, 1, 1)),
            candidate("S", 0.5, date(2020, 1, 1)),
        ]);

        assert_eq!(ranked.sources().len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let ranked = rank(Vec::new());
        assert!(ranked.candidates().is_empty());
        assert!(ranked.target().is_none());
        assert!(ranked.sources().is_empty());
    }
}
