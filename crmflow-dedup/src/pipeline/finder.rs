//! Candidate finder
//!
//! One search against the record store per run. Any failure here aborts the
//! run: deduplicating a partial candidate list could pick the wrong survivor.

use super::call_with_timeout;
use crate::types::{ClientError, DedupKey, RecordStore, SearchResult};
use std::time::Duration;
use tracing::{debug, error};

/// Fetch every record sharing `key`
pub async fn find_candidates(
    store: &dyn RecordStore,
    key: &DedupKey,
    timeout: Duration,
) -> Result<SearchResult, ClientError> {
    debug!(store = store.name(), dedup_key = %key, "Searching for candidates");

    match call_with_timeout(timeout, store.search(key)).await {
        Ok(result) => {
            debug!(
                store = store.name(),
                dedup_key = %key,
                count = result.candidates.len(),
                truncated = result.truncated,
                "Candidate search complete"
            );
            Ok(result)
        }
        Err(e) => {
            error!(
                store = store.name(),
                dedup_key = %key,
                error = %e,
                "Candidate search failed, aborting run"
            );
            Err(e)
        }
    }
}
