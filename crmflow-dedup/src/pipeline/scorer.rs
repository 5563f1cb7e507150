//! Quality scorer
//!
//! Scores each candidate independently from the validation signal. Calls fan
//! out with bounded concurrency; results come back in input order so the
//! ranker's input-order tie-break is deterministic.
//!
//! A failed validation never aborts the run: the candidate scores 0 and the
//! failure is reported alongside the run result.

use super::call_with_timeout;
use crate::types::{Candidate, DedupKey, RawCandidate, ScoringFailure, ValidationSignal};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Score assigned when the validation signal cannot score a candidate
pub const DEFAULT_SCORE: f64 = 0.0;

/// Score a single candidate
pub async fn score_candidate(
    signal: &dyn ValidationSignal,
    raw: RawCandidate,
    key: &DedupKey,
    timeout: Duration,
) -> (Candidate, Option<ScoringFailure>) {
    let result = match raw.secondary_attribute.as_deref() {
        Some(attribute) => call_with_timeout(timeout, signal.validate(attribute))
            .await
            .map_err(|e| e.to_string()),
        None => Err("record has no attribute to validate".to_string()),
    };

    match result {
        Ok(score) => {
            debug!(
                candidate_id = %raw.id,
                signal = signal.name(),
                quality_score = score,
                "Candidate scored"
            );
            (
                Candidate::new(raw.id, key.clone(), raw.created_at, score),
                None,
            )
        }
        Err(detail) => {
            warn!(
                candidate_id = %raw.id,
                signal = signal.name(),
                error = %detail,
                "Validation failed, defaulting quality score to {}",
                DEFAULT_SCORE
            );
            let failure = ScoringFailure {
                candidate_id: raw.id.clone(),
                detail,
            };
            (
                Candidate::new(raw.id, key.clone(), raw.created_at, DEFAULT_SCORE),
                Some(failure),
            )
        }
    }
}

/// Score all candidates with at most `concurrency` calls in flight
///
/// Returned candidates keep the order of `raws`.
pub async fn score_all(
    signal: &dyn ValidationSignal,
    raws: Vec<RawCandidate>,
    key: &DedupKey,
    concurrency: usize,
    timeout: Duration,
) -> (Vec<Candidate>, Vec<ScoringFailure>) {
    let results: Vec<(Candidate, Option<ScoringFailure>)> = stream::iter(raws)
        .map(|raw| score_candidate(signal, raw, key, timeout))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut candidates = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (candidate, failure) in results {
        candidates.push(candidate);
        failures.extend(failure);
    }

    (candidates, failures)
}
