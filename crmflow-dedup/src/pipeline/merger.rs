//! Merge executor
//!
//! Merges sources into the target one at a time, in rank order. Merges are
//! never issued concurrently: two in-flight merges into the same target can
//! race inside the record store. A failed merge is recorded and the loop
//! moves on; already-merged sources are not rolled back.

use super::{call_with_timeout, RunTracker};
use crate::types::{Candidate, MergeOutcome, RecordStore, RunState};
use std::time::Duration;
use tracing::{error, info};

/// Merge every source into `target`, sequentially
pub async fn merge_all(
    store: &dyn RecordStore,
    target: &Candidate,
    sources: &[&Candidate],
    timeout: Duration,
    tracker: &mut RunTracker,
) -> Vec<MergeOutcome> {
    let mut outcomes = Vec::with_capacity(sources.len());

    for (index, source) in sources.iter().enumerate() {
        tracker.transition(RunState::Merging { index });

        let outcome = match call_with_timeout(timeout, store.merge(&source.id, &target.id)).await
        {
            Ok(()) => {
                info!(
                    run_id = %tracker.run_id(),
                    source_id = %source.id,
                    target_id = %target.id,
                    "Merged source into target"
                );
                MergeOutcome::success(source.id.clone(), target.id.clone())
            }
            Err(e) => {
                error!(
                    run_id = %tracker.run_id(),
                    source_id = %source.id,
                    target_id = %target.id,
                    error = %e,
                    "Merge failed, continuing with next source"
                );
                MergeOutcome::failure(source.id.clone(), target.id.clone(), e.to_string())
            }
        };

        outcomes.push(outcome);
    }

    outcomes
}
