//! Workflow action endpoints
//!
//! The automation platform posts a workflow event; the dedup key is read
//! from the configured event field and the run summary comes back as
//! `outputFields`.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use crmflow_common::events::{ActionResponse, WorkflowEvent};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::types::RunReport;
use crate::AppState;

/// POST /actions/merge-contacts
pub async fn merge_contacts(
    State(state): State<AppState>,
    payload: Result<Json<WorkflowEvent>, JsonRejection>,
) -> ApiResult<Json<ActionResponse>> {
    let Json(event) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let raw_key = event.field(&state.dedup_field);

    info!(
        object_id = event.object_id().as_deref().unwrap_or("unknown"),
        dedup_field = %state.dedup_field,
        has_key = raw_key.is_some(),
        "Merge contacts action received"
    );

    match state.pipeline.run(raw_key.as_deref()).await {
        Ok(report) => Ok(Json(report_response(&report))),
        Err(e) => {
            warn!(error = %e, "Merge contacts action aborted");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Render a run report as action output fields
pub fn report_response(report: &RunReport) -> ActionResponse {
    let target_id = report
        .target_id
        .as_ref()
        .map(|id| Value::String(id.to_string()))
        .unwrap_or(Value::Null);

    ActionResponse::new()
        .output("status", report.status.as_str())
        .output("run_id", report.run_id.to_string())
        .output("candidates_found", report.candidates_found)
        .output("truncated", report.truncated)
        .output("target_id", target_id)
        .output("merged_count", report.merged_count())
        .output("failed_count", report.failed_count())
        .output("scoring_failures", report.scoring_failures.len())
}

/// Build action routes
pub fn action_routes() -> Router<AppState> {
    Router::new().route("/actions/merge-contacts", post(merge_contacts))
}
