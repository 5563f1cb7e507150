//! crmflow-dedup library interface
//!
//! Duplicate resolution engine for CRM contacts plus the HTTP action
//! boundary that invokes it. Exposed as a library for integration testing.

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use crate::error::{ApiError, ApiResult};
pub use crate::pipeline::{DedupPipeline, PipelineSettings};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Dedup engine (stateless between runs)
    pub pipeline: Arc<DedupPipeline>,
    /// Event field carrying the dedup key
    pub dedup_field: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<DedupPipeline>, dedup_field: impl Into<String>) -> Self {
        Self {
            pipeline,
            dedup_field: dedup_field.into(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::action_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
