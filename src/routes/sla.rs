//! SLA endpoints: per-case status, the mutation protocol and fleet metrics

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::request_time;
use crate::engine::{aggregate, project, AggregateReport};
use crate::error::{Result, SlaError};
use crate::models::{DerivedSlaStatus, SlaEvent, SlaRecord};
use crate::state::AppState;

/// Body for pause
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRequest {
    #[serde(default)]
    pub reason: String,
    pub at: Option<DateTime<Utc>>,
}

/// Body for resume, first response and resolution. All fields optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampRequest {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalateRequest {
    pub reason: Option<String>,
    pub at: Option<DateTime<Utc>>,
}

/// Result of a mutation: what it emitted and the status right after
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub case_id: Uuid,
    pub events: Vec<SlaEvent>,
    pub sla: DerivedSlaStatus,
}

/// Apply one state machine operation under the record's lock.
pub(crate) fn apply_mutation<F>(
    state: &AppState,
    case_id: Uuid,
    operation: &'static str,
    op: F,
) -> Result<MutationResponse>
where
    F: FnOnce(&mut SlaRecord) -> std::result::Result<Vec<SlaEvent>, SlaError>,
{
    let now = state.clock.now();
    let thresholds = state.config.thresholds;

    let outcome = state.store.update(case_id, |entry| {
        let events = op(&mut entry.record)?;
        let sla = project(&entry.record, now, &thresholds)?;
        Ok((events, sla))
    });

    match outcome {
        Ok((events, sla)) => {
            state.metrics.inc_mutations();
            info!(
                case_id = %case_id,
                operation = operation,
                events = events.len(),
                status = %sla.overall_status,
                "SLA mutation applied"
            );
            state.publish(events.clone());
            Ok(MutationResponse {
                case_id,
                events,
                sla,
            })
        }
        Err(e) => {
            state.metrics.inc_mutations_rejected();
            warn!(case_id = %case_id, operation = operation, error = %e, kind = e.kind(), "SLA mutation rejected");
            Err(e.into())
        }
    }
}

/// GET /sla/cases/:case_id
///
/// Returns the derived SLA status of one case at the current time
pub async fn get_case_sla(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<DerivedSlaStatus>> {
    let entry = state
        .store
        .get(case_id)
        .ok_or(SlaError::RecordNotFound(case_id))?;
    let status = project(&entry.record, state.clock.now(), &state.config.thresholds)?;
    Ok(Json(status))
}

/// POST /sla/cases/:case_id/pause
///
/// Body: `{ "reason": "...", "at": optional timestamp }`
pub async fn pause(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<PauseRequest>,
) -> Result<Json<MutationResponse>> {
    let at = request_time(&state, request.at)?;
    let reason = request.reason.trim().to_string();
    apply_mutation(&state, case_id, "pause", |record| record.pause(at, &reason)).map(Json)
}

/// POST /sla/cases/:case_id/resume
pub async fn resume(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    request: Option<Json<TimestampRequest>>,
) -> Result<Json<MutationResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let at = request_time(&state, request.at)?;
    apply_mutation(&state, case_id, "resume", |record| record.resume(at)).map(Json)
}

/// POST /sla/cases/:case_id/first-response
pub async fn first_response(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    request: Option<Json<TimestampRequest>>,
) -> Result<Json<MutationResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let at = request_time(&state, request.at)?;
    apply_mutation(&state, case_id, "first_response", |record| {
        record.record_first_response(at)
    })
    .map(Json)
}

/// POST /sla/cases/:case_id/resolve
///
/// Records the resolution; an open pause is closed at the same instant.
pub async fn resolve(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    request: Option<Json<TimestampRequest>>,
) -> Result<Json<MutationResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let at = request_time(&state, request.at)?;
    apply_mutation(&state, case_id, "resolve", |record| record.record_resolution(at)).map(Json)
}

/// POST /sla/cases/:case_id/escalate
///
/// Manual escalation. Repeating it is a no-op that returns no events.
pub async fn escalate(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    request: Option<Json<EscalateRequest>>,
) -> Result<Json<MutationResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let at = request_time(&state, request.at)?;
    let reason = request.reason.filter(|r| !r.trim().is_empty());
    let response = apply_mutation(&state, case_id, "escalate", |record| {
        record.escalate(at, reason.as_deref())
    })?;
    if !response.events.is_empty() {
        state.metrics.inc_escalations(1);
    }
    Ok(Json(response))
}

/// GET /sla/metrics
///
/// Fleet-wide aggregation at one instant. Records that fail to project are
/// listed in `failures` and excluded from the counts.
pub async fn sla_metrics(State(state): State<AppState>) -> Result<Json<AggregateReport>> {
    let entries = state.store.snapshot();
    let report = aggregate(
        entries.iter().map(|e| &e.record),
        state.clock.now(),
        &state.config.thresholds,
    );
    if report.is_partial() {
        warn!(
            failed = report.failures.len(),
            "SLA aggregation partially failed"
        );
    }
    Ok(Json(report))
}
