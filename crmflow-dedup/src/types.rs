//! Core types and collaborator traits for duplicate resolution
//!
//! # Architecture
//! One run resolves one dedup key:
//! - **Finder:** `RecordStore::search` → `RawCandidate`s
//! - **Scorer:** `ValidationSignal::validate` → `Candidate`s
//! - **Ranker:** pure ordering → `RankedSet`
//! - **Merger:** `RecordStore::merge` per source → `MergeOutcome`s
//!
//! External responses are coerced into these types once, at the client
//! boundary. Nothing here is retained between runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque external record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Attribute value shared by candidate duplicates (e.g. a phone number)
///
/// Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// Parse a raw key; absent or blank input yields `None`
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Record returned by the record store search, validated at ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub id: RecordId,
    /// Attribute sent to the validation signal (email address)
    pub secondary_attribute: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Records sharing one dedup key, as returned by a store search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub candidates: Vec<RawCandidate>,
    /// More matches existed than the store was allowed to page through
    pub truncated: bool,
}

/// Scored candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: RecordId,
    pub dedup_key: DedupKey,
    pub created_at: DateTime<Utc>,
    pub quality_score: f64,
}

impl Candidate {
    pub fn new(
        id: RecordId,
        dedup_key: DedupKey,
        created_at: DateTime<Utc>,
        quality_score: f64,
    ) -> Self {
        Self {
            id,
            dedup_key,
            created_at,
            quality_score: sanitize_score(quality_score),
        }
    }
}

/// Non-finite scores rank as the minimum
pub fn sanitize_score(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Candidate whose validation call failed; its score defaulted to 0
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringFailure {
    pub candidate_id: RecordId,
    pub detail: String,
}

/// Result of merging one source into the target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub source_id: RecordId,
    pub target_id: RecordId,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl MergeOutcome {
    pub fn success(source_id: RecordId, target_id: RecordId) -> Self {
        Self {
            source_id,
            target_id,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(source_id: RecordId, target_id: RecordId, detail: impl Into<String>) -> Self {
        Self {
            source_id,
            target_id,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

// ============================================================================
// Run lifecycle
// ============================================================================

/// Pipeline state for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Finding,
    Scoring,
    Ranking,
    Merging { index: usize },
    Done,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

/// How a completed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Dedup key absent from the event; nothing to do
    Skipped,
    /// Fewer than two candidates shared the key
    NoDuplicates,
    /// Target selected and merges attempted
    Resolved,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Skipped => "skipped",
            RunStatus::NoDuplicates => "no_duplicates",
            RunStatus::Resolved => "resolved",
        }
    }
}

/// Summary of one completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dedup_key: Option<DedupKey>,
    pub status: RunStatus,
    pub candidates_found: usize,
    /// Dedup ran on a partial candidate list
    pub truncated: bool,
    pub target_id: Option<RecordId>,
    pub outcomes: Vec<MergeOutcome>,
    pub scoring_failures: Vec<ScoringFailure>,
    pub final_state: RunState,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn merged_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded).count()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Collaborator call error
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, TLS, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its time budget
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Non-success HTTP status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Required input or credential missing
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Fatal run error
///
/// Only the candidate lookup can abort a run. Scoring and merge failures are
/// reported inside `RunReport`.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Candidate lookup failed for key {key}: {source}")]
    Lookup {
        key: DedupKey,
        #[source]
        source: ClientError,
        /// Run state when the error was returned
        state: RunState,
    },
}

impl DedupError {
    /// State the failed run ended in
    pub fn final_state(&self) -> RunState {
        match self {
            DedupError::Lookup { state, .. } => *state,
        }
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// External record store (CRM)
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    /// Find all records sharing the dedup key
    async fn search(&self, key: &DedupKey) -> Result<SearchResult, ClientError>;

    /// Merge `source_id` into `target_id`
    async fn merge(&self, source_id: &RecordId, target_id: &RecordId) -> Result<(), ClientError>;
}

/// External validation signal producing a quality score for an attribute
#[async_trait]
pub trait ValidationSignal: Send + Sync {
    /// Signal name for logging
    fn name(&self) -> &'static str;

    /// Score an attribute value (higher is better)
    async fn validate(&self, attribute: &str) -> Result<f64, ClientError>;
}
