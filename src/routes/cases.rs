//! Case endpoints: creation, removal, status updates and the triage queue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::request_time;
use crate::engine::{aggregate, project, triage, SortBy, SortOrder, TriageQuery, TriageResult};
use crate::error::{AppError, Result, SlaError};
use crate::models::{Case, CaseStatus, DerivedSlaStatus, Priority, SlaEvent, SlaRecord};
use crate::state::AppState;

/// Request body for case creation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    /// Ticket number; generated when absent
    pub protocol: Option<String>,
    pub customer_name: String,
    pub case_type: String,
    pub priority: Priority,
    #[serde(default = "default_status")]
    pub status: CaseStatus,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_status() -> CaseStatus {
    CaseStatus::Created
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResponse {
    #[serde(flatten)]
    pub case: Case,
    pub sla: DerivedSlaStatus,
}

/// POST /cases
///
/// Creates a case and its SLA record together. Targets are resolved from
/// the configured policy at this moment and never change afterwards.
pub async fn create_case(
    State(state): State<AppState>,
    Json(request): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<CaseResponse>)> {
    if request.customer_name.trim().is_empty() {
        return Err(AppError::InvalidRequest("customerName is required".into()));
    }
    if request.case_type.trim().is_empty() {
        return Err(AppError::InvalidRequest("caseType is required".into()));
    }
    if request.status.is_terminal() {
        return Err(AppError::InvalidRequest(
            "cases cannot be created resolved or closed".into(),
        ));
    }

    let created_at = request_time(&state, request.created_at)?;
    let id = Uuid::new_v4();
    let protocol = request
        .protocol
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| format!("CASE-{}", &id.simple().to_string()[..8]).to_uppercase());

    let case = Case {
        id,
        protocol,
        customer_name: request.customer_name.trim().to_string(),
        case_type: request.case_type.trim().to_string(),
        priority: request.priority,
        status: request.status,
        created_at,
    };
    let targets = state.config.targets.targets_for(case.priority, &case.case_type);
    let record = SlaRecord::new(&case, targets);
    let sla = project(&record, state.clock.now(), &state.config.thresholds)?;

    if !state.store.insert(case.clone(), record) {
        return Err(AppError::InternalError(format!("Case id {} collided", id)));
    }
    state.metrics.inc_cases_created();
    info!(
        case_id = %case.id,
        protocol = %case.protocol,
        priority = %case.priority,
        response_minutes = targets.response_time_minutes,
        resolution_minutes = targets.resolution_time_minutes,
        "Case created"
    );

    Ok((StatusCode::CREATED, Json(CaseResponse { case, sla })))
}

/// DELETE /cases/:case_id
///
/// Removes the case and its SLA record.
pub async fn delete_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .store
        .remove(case_id)
        .ok_or(SlaError::RecordNotFound(case_id))?;
    state.metrics.inc_cases_deleted();
    info!(case_id = %case_id, "Case deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: CaseStatus,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    #[serde(flatten)]
    pub case: Case,
    pub sla: DerivedSlaStatus,
    pub events: Vec<SlaEvent>,
}

/// PATCH /cases/:case_id/status
///
/// Moving into RESOLVED or CLOSED records the SLA resolution if it is not
/// already recorded. A case whose SLA is resolved cannot be reopened.
pub async fn update_case_status(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>> {
    let at = request_time(&state, request.at)?;
    let now = state.clock.now();
    let thresholds = state.config.thresholds;

    let (case, sla, events) = state.store.update(case_id, |entry| {
        let mut events = Vec::new();
        if request.status.is_terminal() {
            if entry.record.resolved_at.is_none() {
                events = entry.record.record_resolution(at)?;
            }
        } else if entry.record.resolved_at.is_some() {
            return Err(SlaError::TerminalRecord);
        }
        entry.case.status = request.status;
        let sla = project(&entry.record, now, &thresholds)?;
        Ok((entry.case.clone(), sla, events))
    })?;

    info!(case_id = %case_id, status = %case.status, "Case status updated");
    state.publish(events.clone());
    Ok(Json(UpdateStatusResponse { case, sla, events }))
}

/// Query parameters for the triage queue
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasesQuery {
    /// Comma separated priorities, or "all"
    pub priority: Option<String>,
    /// Comma separated statuses, or "all"
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl CasesQuery {
    pub fn into_triage_query(self) -> Result<TriageQuery> {
        Ok(TriageQuery {
            priorities: parse_list(self.priority.as_deref())?,
            statuses: parse_list(self.status.as_deref())?,
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort_by: parse_opt::<SortBy>(self.sort_by.as_deref())?.unwrap_or_default(),
            sort_order: parse_opt::<SortOrder>(self.sort_order.as_deref())?.unwrap_or_default(),
        })
    }
}

fn parse_list<T>(raw: Option<&str>) -> Result<Vec<T>>
where
    T: std::str::FromStr<Err = String>,
{
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut values = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item.eq_ignore_ascii_case("all") {
            return Ok(Vec::new());
        }
        values.push(item.parse().map_err(AppError::InvalidRequest)?);
    }
    Ok(values)
}

fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(AppError::InvalidRequest))
        .transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResponse {
    pub now: DateTime<Utc>,
    pub count: usize,
    #[serde(flatten)]
    pub result: TriageResult,
}

/// GET /cases?priority=&status=&search=&sortBy=&sortOrder=
///
/// The agent's work queue: filtered, then ordered by SLA urgency, priority
/// or creation date. Every case in one response is evaluated at the same
/// instant.
pub async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<CasesQuery>,
) -> Result<Json<TriageResponse>> {
    let query = params.into_triage_query()?;
    let now = state.clock.now();

    let entries = state.store.snapshot();
    let report = aggregate(entries.iter().map(|e| &e.record), now, &state.config.thresholds);
    let cases = entries.into_iter().map(|e| e.case).collect();
    let result = triage(cases, &report, &query);

    if !result.sla_failures.is_empty() {
        warn!(
            failed = result.sla_failures.len(),
            "Cases with unresolvable SLA excluded from ranking"
        );
    }

    Ok(Json(TriageResponse {
        now,
        count: result.cases.len(),
        result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsing() {
        let query = CasesQuery {
            priority: Some("HIGH, medium".into()),
            status: Some("all".into()),
            search: Some("  ".into()),
            sort_by: Some("priority".into()),
            sort_order: Some("DESC".into()),
        }
        .into_triage_query()
        .unwrap();

        assert_eq!(query.priorities, vec![Priority::High, Priority::Medium]);
        assert!(query.statuses.is_empty());
        assert!(query.search.is_none());
        assert_eq!(query.sort_by, SortBy::Priority);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_query_defaults_and_errors() {
        let query = CasesQuery::default().into_triage_query().unwrap();
        assert_eq!(query, TriageQuery::default());

        let bad = CasesQuery {
            sort_by: Some("name".into()),
            ..CasesQuery::default()
        };
        assert!(bad.into_triage_query().is_err());

        let bad = CasesQuery {
            priority: Some("URGENT".into()),
            ..CasesQuery::default()
        };
        assert!(bad.into_triage_query().is_err());
    }
}
