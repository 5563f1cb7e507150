//! Test doubles for the record store and validation signal
//!
//! Both fakes record every call so tests can assert on ordering and
//! concurrency without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crmflow_dedup::types::{
    ClientError, DedupKey, RawCandidate, RecordId, RecordStore, SearchResult, ValidationSignal,
};
use crmflow_dedup::{DedupPipeline, PipelineSettings};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn raw(id: &str, email: Option<&str>, created_at: DateTime<Utc>) -> RawCandidate {
    RawCandidate {
        id: RecordId::from(id),
        secondary_attribute: email.map(str::to_string),
        created_at,
    }
}

pub fn settings(concurrency: usize, timeout_ms: u64) -> PipelineSettings {
    PipelineSettings {
        scoring_concurrency: concurrency,
        call_timeout: Duration::from_millis(timeout_ms),
    }
}

pub fn pipeline(
    store: Arc<FakeRecordStore>,
    signal: Arc<FakeSignal>,
    settings: PipelineSettings,
) -> DedupPipeline {
    DedupPipeline::new(store, signal, settings)
}

/// Tracks how many calls are in flight at once
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Record store
// ============================================================================

pub enum SearchBehavior {
    Return(Vec<RawCandidate>),
    Fail,
    Hang,
}

pub struct FakeRecordStore {
    search: SearchBehavior,
    truncated: bool,
    failing_merges: HashSet<String>,
    hanging_merges: HashSet<String>,
    merge_delay: Duration,
    search_calls: AtomicUsize,
    merges: Mutex<Vec<(String, String)>>,
    pub merge_in_flight: InFlight,
}

impl FakeRecordStore {
    pub fn returning(candidates: Vec<RawCandidate>) -> Self {
        Self::with_behavior(SearchBehavior::Return(candidates))
    }

    pub fn failing_search() -> Self {
        Self::with_behavior(SearchBehavior::Fail)
    }

    pub fn hanging_search() -> Self {
        Self::with_behavior(SearchBehavior::Hang)
    }

    fn with_behavior(search: SearchBehavior) -> Self {
        Self {
            search,
            truncated: false,
            failing_merges: HashSet::new(),
            hanging_merges: HashSet::new(),
            merge_delay: Duration::ZERO,
            search_calls: AtomicUsize::new(0),
            merges: Mutex::new(Vec::new()),
            merge_in_flight: InFlight::default(),
        }
    }

    /// Report the search as cut off before all matches were returned
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Merging this source fails with an API error
    pub fn fail_merge_of(mut self, source_id: &str) -> Self {
        self.failing_merges.insert(source_id.to_string());
        self
    }

    /// Merging this source never completes
    pub fn hang_merge_of(mut self, source_id: &str) -> Self {
        self.hanging_merges.insert(source_id.to_string());
        self
    }

    pub fn with_merge_delay(mut self, delay: Duration) -> Self {
        self.merge_delay = delay;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Attempted merges as `(source, target)` in call order
    pub fn merges(&self) -> Vec<(String, String)> {
        self.merges.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FakeRecordStore {
    fn name(&self) -> &'static str {
        "FakeStore"
    }

    async fn search(&self, _key: &DedupKey) -> Result<SearchResult, ClientError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match &self.search {
            SearchBehavior::Return(candidates) => Ok(SearchResult {
                candidates: candidates.clone(),
                truncated: self.truncated,
            }),
            SearchBehavior::Fail => Err(ClientError::Network("connection refused".to_string())),
            SearchBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn merge(&self, source_id: &RecordId, target_id: &RecordId) -> Result<(), ClientError> {
        self.merges
            .lock()
            .unwrap()
            .push((source_id.to_string(), target_id.to_string()));

        self.merge_in_flight.enter();
        if !self.merge_delay.is_zero() {
            tokio::time::sleep(self.merge_delay).await;
        }
        if self.hanging_merges.contains(source_id.as_str()) {
            std::future::pending::<()>().await;
        }
        self.merge_in_flight.exit();

        if self.failing_merges.contains(source_id.as_str()) {
            return Err(ClientError::Api {
                status: 500,
                body: format!("merge of {} rejected", source_id),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Validation signal
// ============================================================================

pub struct FakeSignal {
    scores: HashMap<String, f64>,
    hanging: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    pub in_flight: InFlight,
}

impl FakeSignal {
    /// Scores by attribute; unknown attributes fail
    pub fn with_scores(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            hanging: HashSet::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: InFlight::default(),
        }
    }

    /// Validating this attribute never completes
    pub fn hang_on(mut self, attribute: &str) -> Self {
        self.hanging.insert(attribute.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ValidationSignal for FakeSignal {
    fn name(&self) -> &'static str {
        "FakeSignal"
    }

    async fn validate(&self, attribute: &str) -> Result<f64, ClientError> {
        self.calls.lock().unwrap().push(attribute.to_string());

        self.in_flight.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.hanging.contains(attribute) {
            std::future::pending::<()>().await;
        }
        self.in_flight.exit();

        self.scores
            .get(attribute)
            .copied()
            .ok_or_else(|| ClientError::Api {
                status: 503,
                body: "validation service unavailable".to_string(),
            })
    }
}
