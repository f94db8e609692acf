//! SLA aggregator: per-record projection into `DerivedSlaStatus` and
//! fleet-wide counts, all evaluated at one logical `now`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state_machine::{classify, Metric, ThresholdPolicy};
use crate::error::SlaError;
use crate::models::{DerivedSlaStatus, FleetMetrics, ProjectionFailure, SlaRecord, SlaStatus};

/// Output of one aggregation pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub now: DateTime<Utc>,
    #[serde(skip)]
    pub statuses: Vec<(Uuid, DerivedSlaStatus)>,
    pub metrics: FleetMetrics,
    /// Records that could not be projected. They count only in `failedCount`.
    pub failures: Vec<ProjectionFailure>,
}

impl AggregateReport {
    pub fn status_of(&self, case_id: Uuid) -> Option<&DerivedSlaStatus> {
        self.statuses
            .iter()
            .find(|(id, _)| *id == case_id)
            .map(|(_, status)| status)
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Project one record at `now`.
pub fn project(
    record: &SlaRecord,
    now: DateTime<Utc>,
    policy: &ThresholdPolicy,
) -> Result<DerivedSlaStatus, SlaError> {
    record.validate()?;

    let instant = record.evaluation_instant(now);
    let response_target = target_seconds(record.response_time_minutes)?;
    let resolution_target = target_seconds(record.resolution_time_minutes)?;

    // A met milestone freezes that metric at the milestone time.
    let response_at = record
        .first_response_at
        .map_or(instant, |t| t.min(instant));
    let response_elapsed = record.effective_elapsed(response_at).num_seconds();
    let resolution_elapsed = record.effective_elapsed(instant).num_seconds();

    let response_left = response_target - response_elapsed;
    let resolution_left = resolution_target - resolution_elapsed;

    let response_status = match (record.first_response_at, record.resolved_at) {
        (Some(_), _) => SlaStatus::Completed,
        // resolving without a first response still answers the customer
        (None, Some(_)) if response_left > 0 => SlaStatus::Completed,
        (None, Some(_)) => SlaStatus::Breached,
        (None, None) => classify(Metric::Response, response_left, response_target, policy),
    };
    let resolution_status = if record.resolved_at.is_some() {
        SlaStatus::Completed
    } else {
        classify(
            Metric::Resolution,
            resolution_left,
            resolution_target,
            policy,
        )
    };
    let overall_status = response_status.worst(resolution_status);

    let floor = policy.remaining_floor_minutes;
    let response_remaining = response_left.div_euclid(60).max(floor);
    let resolution_remaining = resolution_left.div_euclid(60).max(floor);

    let mut derived = DerivedSlaStatus {
        response_remaining,
        resolution_remaining,
        response_status,
        resolution_status,
        overall_status,
        response_progress_pct: progress_pct(response_elapsed, response_target),
        resolution_progress_pct: progress_pct(resolution_elapsed, resolution_target),
        paused: record.is_paused() && record.resolved_at.is_none(),
        paused_duration_minutes: record.paused_duration(instant).num_minutes(),
        effective_elapsed_minutes: resolution_elapsed.div_euclid(60),
        response_time_minutes: record.response_time_minutes,
        resolution_time_minutes: record.resolution_time_minutes,
        priority: record.priority,
        escalated: record.is_escalated(),
        escalated_at: record.escalated_at,
        first_response_at: record.first_response_at,
        resolved_at: record.resolved_at,
        remaining_label: String::new(),
    };
    derived.remaining_label = remaining_label(&derived);
    Ok(derived)
}

fn target_seconds(minutes: i64) -> Result<i64, SlaError> {
    minutes
        .checked_mul(60)
        .ok_or_else(|| SlaError::MalformedRecord(format!("target of {} minutes is too large", minutes)))
}

fn progress_pct(elapsed: i64, target: i64) -> f64 {
    let pct = (elapsed as f64 / target as f64 * 100.0).clamp(0.0, 100.0);
    (pct * 10.0).round() / 10.0
}

fn remaining_label(status: &DerivedSlaStatus) -> String {
    match status.overall_status {
        SlaStatus::Completed => "Completed".to_string(),
        SlaStatus::Breached => "Breached".to_string(),
        _ => status
            .urgency_minutes()
            .map(format_minutes)
            .unwrap_or_else(|| "Completed".to_string()),
    }
}

/// Human form of a positive minute count: `45m`, `2h 15m`, `1d 3h`.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 24 {
        format!("{}d {}h", hours / 24, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Project a batch of records at a single `now` and fold fleet metrics.
///
/// A record that fails to project is reported in `failures` and left out of
/// every other count; it never fails the batch.
pub fn aggregate<'a, I>(records: I, now: DateTime<Utc>, policy: &ThresholdPolicy) -> AggregateReport
where
    I: IntoIterator<Item = &'a SlaRecord>,
{
    let mut statuses = Vec::new();
    let mut failures = Vec::new();
    let mut metrics = FleetMetrics::default();

    for record in records {
        match project(record, now, policy) {
            Ok(derived) => {
                // a resolved record is frozen, whatever its response metric says
                let status = derived.overall_status;
                if derived.resolved_at.is_some() || status == SlaStatus::Completed {
                    metrics.completed_count += 1;
                } else {
                    metrics.total_active += 1;
                    if status.is_at_risk() {
                        metrics.at_risk_count += 1;
                    } else if status == SlaStatus::Breached {
                        metrics.breached_count += 1;
                    }
                }
                if derived.paused {
                    metrics.paused_count += 1;
                }
                if derived.escalated {
                    metrics.escalated_count += 1;
                }
                statuses.push((record.case_id, derived));
            }
            Err(err) => {
                metrics.failed_count += 1;
                failures.push(ProjectionFailure {
                    case_id: record.case_id,
                    cause: err.to_string(),
                });
            }
        }
    }

    AggregateReport {
        now,
        statuses,
        metrics,
        failures,
    }
}
