//! Core domain models for the SLA triage engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Case priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Triage rank: HIGH sorts before MEDIUM before LOW.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Case lifecycle status. Owned by the case workflow; the engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Created,
    Assigned,
    InProgress,
    Resolved,
    Closed,
}

impl CaseStatus {
    /// RESOLVED and CLOSED freeze the SLA record.
    pub fn is_terminal(self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Created => "CREATED",
            CaseStatus::Assigned => "ASSIGNED",
            CaseStatus::InProgress => "IN_PROGRESS",
            CaseStatus::Resolved => "RESOLVED",
            CaseStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CREATED" => Ok(CaseStatus::Created),
            "ASSIGNED" => Ok(CaseStatus::Assigned),
            "IN_PROGRESS" => Ok(CaseStatus::InProgress),
            "RESOLVED" => Ok(CaseStatus::Resolved),
            "CLOSED" => Ok(CaseStatus::Closed),
            _ => Err(format!("Invalid case status: {}", s)),
        }
    }
}

/// A unit of customer work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: Uuid,
    /// Human-facing ticket number
    pub protocol: String,
    pub customer_name: String,
    pub case_type: String,
    pub priority: Priority,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
}

/// SLA status of one metric, or of a whole record.
///
/// This is the only status vocabulary in the engine; every consumer
/// (triage, aggregation, escalation, HTTP) reads the same enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaStatus {
    Normal,
    Warning,
    Critical,
    Breached,
    Completed,
}

impl SlaStatus {
    /// Severity rank. COMPLETED is the least severe.
    pub fn severity(self) -> u8 {
        match self {
            SlaStatus::Completed => 0,
            SlaStatus::Normal => 1,
            SlaStatus::Warning => 2,
            SlaStatus::Critical => 3,
            SlaStatus::Breached => 4,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: SlaStatus) -> SlaStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn is_at_risk(self) -> bool {
        matches!(self, SlaStatus::Warning | SlaStatus::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlaStatus::Normal => "NORMAL",
            SlaStatus::Warning => "WARNING",
            SlaStatus::Critical => "CRITICAL",
            SlaStatus::Breached => "BREACHED",
            SlaStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span excluded from SLA elapsed time. `end == None` means still paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: String,
}

impl PausedInterval {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Response and resolution targets in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaTargets {
    pub response_time_minutes: i64,
    pub resolution_time_minutes: i64,
}

impl SlaTargets {
    pub const fn new(response_time_minutes: i64, resolution_time_minutes: i64) -> Self {
        Self {
            response_time_minutes,
            resolution_time_minutes,
        }
    }
}

/// SLA bookkeeping for exactly one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaRecord {
    pub case_id: Uuid,
    /// Snapshot of the case creation time
    pub created_at: DateTime<Utc>,
    /// Snapshot of the case priority when the record was created
    pub priority: Priority,
    pub response_time_minutes: i64,
    pub resolution_time_minutes: i64,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_intervals: Vec<PausedInterval>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl SlaRecord {
    /// Create a fresh record for a case with the targets resolved at creation time.
    pub fn new(case: &Case, targets: SlaTargets) -> Self {
        Self {
            case_id: case.id,
            created_at: case.created_at,
            priority: case.priority,
            response_time_minutes: targets.response_time_minutes,
            resolution_time_minutes: targets.resolution_time_minutes,
            first_response_at: None,
            resolved_at: None,
            paused_intervals: Vec::new(),
            escalated_at: None,
        }
    }

    /// The currently open pause, if any
    pub fn open_interval(&self) -> Option<&PausedInterval> {
        self.paused_intervals.last().filter(|i| i.is_open())
    }

    pub fn is_paused(&self) -> bool {
        self.open_interval().is_some()
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated_at.is_some()
    }
}

/// Computed read model for one record at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSlaStatus {
    pub response_remaining: i64,
    pub resolution_remaining: i64,
    pub response_status: SlaStatus,
    pub resolution_status: SlaStatus,
    pub overall_status: SlaStatus,
    pub response_progress_pct: f64,
    pub resolution_progress_pct: f64,
    pub paused: bool,
    pub paused_duration_minutes: i64,
    pub effective_elapsed_minutes: i64,
    pub response_time_minutes: i64,
    pub resolution_time_minutes: i64,
    pub priority: Priority,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Human label for the most urgent remaining time, e.g. "2h 15m"
    pub remaining_label: String,
}

impl DerivedSlaStatus {
    /// Smallest remaining time across metrics that are not yet completed.
    ///
    /// `None` when both metrics are completed.
    pub fn urgency_minutes(&self) -> Option<i64> {
        let response = (self.response_status != SlaStatus::Completed)
            .then_some(self.response_remaining);
        let resolution = (self.resolution_status != SlaStatus::Completed)
            .then_some(self.resolution_remaining);
        match (response, resolution) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Side events emitted by state machine operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaEvent {
    #[serde(rename_all = "camelCase")]
    FirstResponse { case_id: Uuid, at: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    Resolved { case_id: Uuid, at: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    Paused {
        case_id: Uuid,
        at: DateTime<Utc>,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    Resumed {
        case_id: Uuid,
        at: DateTime<Utc>,
        paused_minutes: i64,
    },
    /// An open pause was closed because the case was resolved
    #[serde(rename_all = "camelCase")]
    PauseAutoClosed {
        case_id: Uuid,
        started_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Escalated {
        case_id: Uuid,
        at: DateTime<Utc>,
        reason: Option<String>,
    },
}

impl SlaEvent {
    pub fn case_id(&self) -> Uuid {
        match self {
            SlaEvent::FirstResponse { case_id, .. }
            | SlaEvent::Resolved { case_id, .. }
            | SlaEvent::Paused { case_id, .. }
            | SlaEvent::Resumed { case_id, .. }
            | SlaEvent::PauseAutoClosed { case_id, .. }
            | SlaEvent::Escalated { case_id, .. } => *case_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SlaEvent::FirstResponse { .. } => "FIRST_RESPONSE",
            SlaEvent::Resolved { .. } => "RESOLVED",
            SlaEvent::Paused { .. } => "PAUSED",
            SlaEvent::Resumed { .. } => "RESUMED",
            SlaEvent::PauseAutoClosed { .. } => "PAUSE_AUTO_CLOSED",
            SlaEvent::Escalated { .. } => "ESCALATED",
        }
    }
}

/// Fleet-wide counts used by dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetMetrics {
    pub total_active: usize,
    /// Overall WARNING or CRITICAL
    pub at_risk_count: usize,
    pub breached_count: usize,
    pub completed_count: usize,
    pub paused_count: usize,
    pub escalated_count: usize,
    pub failed_count: usize,
}

/// A record that could not be projected, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionFailure {
    pub case_id: Uuid,
    pub cause: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_status_prefers_severity() {
        assert_eq!(
            SlaStatus::Completed.worst(SlaStatus::Warning),
            SlaStatus::Warning
        );
        assert_eq!(
            SlaStatus::Breached.worst(SlaStatus::Critical),
            SlaStatus::Breached
        );
        assert_eq!(
            SlaStatus::Completed.worst(SlaStatus::Completed),
            SlaStatus::Completed
        );
    }

    #[test]
    fn test_priority_parse_and_rank() {
        assert_eq!("high".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = SlaEvent::Escalated {
            case_id: Uuid::nil(),
            at: DateTime::<Utc>::default(),
            reason: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ESCALATED");
        assert!(json.get("caseId").is_some());
    }
}
