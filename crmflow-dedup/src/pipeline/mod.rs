//! Duplicate resolution pipeline
//!
//! # State Progression
//! Idle → Finding → (≤1 candidate: Done) → Scoring → Ranking → Merging(i) → Done
//!
//! `Aborted` is reachable only from Finding. Each stage lives in its own
//! module:
//!
//! - **finder**: record store search (fatal on failure)
//! - **scorer**: bounded fan-out over the validation signal (failures score 0)
//! - **ranker**: pure ordering and target selection
//! - **merger**: sequential merges (failures recorded, loop continues)
//!
//! A pipeline holds only client handles and settings; every run re-fetches
//! and nothing is kept afterwards.

pub mod finder;
pub mod merger;
pub mod ranker;
pub mod scorer;

pub use ranker::{rank, RankedSet};

use crate::clients::{build_validation_signal, HubSpotClient};
use crate::config::{DedupConfig, PipelineConfig, ResolvedCredentials};
use crate::types::{
    ClientError, DedupError, DedupKey, MergeOutcome, RecordId, RecordStore, RunReport, RunState,
    RunStatus, ScoringFailure, ValidationSignal,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runtime knobs for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum validation calls in flight
    pub scoring_concurrency: usize,
    /// Budget for every outbound call
    pub call_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            scoring_concurrency: config.scoring_concurrency.max(1),
            call_timeout: config.call_timeout(),
        }
    }
}

/// Tracks the state of a single run
#[derive(Debug)]
pub struct RunTracker {
    run_id: Uuid,
    state: RunState,
    started: Instant,
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Idle,
            started: Instant::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transition(&mut self, next: RunState) {
        debug!(run_id = %self.run_id, from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a collaborator call under a time budget
///
/// Expiry is reported as `ClientError::Timeout`, the same category of
/// failure as a network error.
pub async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Duplicate resolution engine
pub struct DedupPipeline {
    store: Arc<dyn RecordStore>,
    signal: Arc<dyn ValidationSignal>,
    settings: PipelineSettings,
}

impl DedupPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        signal: Arc<dyn ValidationSignal>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            signal,
            settings,
        }
    }

    /// Build the production pipeline (HubSpot + configured validation signal)
    pub fn from_config(
        config: &DedupConfig,
        credentials: ResolvedCredentials,
    ) -> Result<Self, ClientError> {
        let store = Arc::new(HubSpotClient::new(&config.hubspot, credentials.hubspot_token)?);
        let signal = build_validation_signal(&config.validation, credentials.validation_key)?;

        info!(
            store = store.name(),
            signal = signal.name(),
            scoring_concurrency = config.pipeline.scoring_concurrency,
            call_timeout_ms = config.pipeline.call_timeout_ms,
            "Dedup pipeline initialized"
        );

        Ok(Self::new(store, signal, PipelineSettings::from(&config.pipeline)))
    }

    /// Run for a raw key taken from an inbound event
    ///
    /// A missing or blank key is a no-op (`RunStatus::Skipped`), not an error.
    pub async fn run(&self, raw_key: Option<&str>) -> Result<RunReport, DedupError> {
        let mut tracker = RunTracker::new();

        let Some(key) = DedupKey::parse(raw_key) else {
            info!(
                run_id = %tracker.run_id(),
                "Dedup key missing from event, skipping run"
            );
            tracker.transition(RunState::Done);
            return Ok(self.report(
                &tracker,
                None,
                RunStatus::Skipped,
                0,
                false,
                None,
                vec![],
                vec![],
            ));
        };

        self.resolve_with(key, tracker).await
    }

    /// Resolve duplicates for a parsed key
    pub async fn resolve(&self, key: DedupKey) -> Result<RunReport, DedupError> {
        self.resolve_with(key, RunTracker::new()).await
    }

    async fn resolve_with(
        &self,
        key: DedupKey,
        mut tracker: RunTracker,
    ) -> Result<RunReport, DedupError> {
        let timeout = self.settings.call_timeout;

        // Finding
        tracker.transition(RunState::Finding);
        let found = match finder::find_candidates(self.store.as_ref(), &key, timeout).await {
            Ok(found) => found,
            Err(source) => {
                tracker.transition(RunState::Aborted);
                return Err(DedupError::Lookup {
                    key,
                    source,
                    state: tracker.state(),
                });
            }
        };

        let truncated = found.truncated;
        if truncated {
            warn!(
                run_id = %tracker.run_id(),
                dedup_key = %key,
                "Candidate list is partial, resolving the records found"
            );
        }

        let raws = found.candidates;
        let candidates_found = raws.len();
        if candidates_found <= 1 {
            info!(
                run_id = %tracker.run_id(),
                dedup_key = %key,
                candidates_found,
                "Fewer than two candidates found, nothing to merge"
            );
            tracker.transition(RunState::Done);
            return Ok(self.report(
                &tracker,
                Some(key),
                RunStatus::NoDuplicates,
                candidates_found,
                truncated,
                None,
                vec![],
                vec![],
            ));
        }

        // Scoring
        tracker.transition(RunState::Scoring);
        let (candidates, scoring_failures) = scorer::score_all(
            self.signal.as_ref(),
            raws,
            &key,
            self.settings.scoring_concurrency,
            timeout,
        )
        .await;

        // Ranking
        tracker.transition(RunState::Ranking);
        let ranked = rank(candidates);
        let (target, sources) = match ranked.target() {
            Some(target) => (target, ranked.sources()),
            None => {
                tracker.transition(RunState::Done);
                return Ok(self.report(
                    &tracker,
                    Some(key),
                    RunStatus::NoDuplicates,
                    candidates_found,
                    truncated,
                    None,
                    vec![],
                    scoring_failures,
                ));
            }
        };

        info!(
            run_id = %tracker.run_id(),
            dedup_key = %key,
            target_id = %target.id,
            quality_score = target.quality_score,
            sources = sources.len(),
            "Merge target selected"
        );

        // Merging
        let outcomes = if sources.is_empty() {
            info!(
                run_id = %tracker.run_id(),
                target_id = %target.id,
                "All candidates resolve to the target record. No merges needed."
            );
            Vec::new()
        } else {
            merger::merge_all(self.store.as_ref(), target, &sources, timeout, &mut tracker).await
        };

        tracker.transition(RunState::Done);
        let target_id = target.id.clone();
        let report = self.report(
            &tracker,
            Some(key),
            RunStatus::Resolved,
            candidates_found,
            truncated,
            Some(target_id),
            outcomes,
            scoring_failures,
        );

        info!(
            run_id = %report.run_id,
            merged = report.merged_count(),
            failed = report.failed_count(),
            scoring_failures = report.scoring_failures.len(),
            elapsed_ms = report.elapsed_ms,
            "Dedup run complete"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        tracker: &RunTracker,
        dedup_key: Option<DedupKey>,
        status: RunStatus,
        candidates_found: usize,
        truncated: bool,
        target_id: Option<RecordId>,
        outcomes: Vec<MergeOutcome>,
        scoring_failures: Vec<ScoringFailure>,
    ) -> RunReport {
        RunReport {
            run_id: tracker.run_id(),
            dedup_key,
            status,
            candidates_found,
            truncated,
            target_id,
            outcomes,
            scoring_failures,
            final_state: tracker.state(),
            elapsed_ms: tracker.elapsed_ms(),
        }
    }
}
