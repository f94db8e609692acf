//! SLA state machine: elapsed-time accounting, status classification and
//! the mutating protocol (first response, resolution, pause, resume,
//! escalate).
//!
//! Every operation takes its timestamp as input and validates before
//! touching the record, so a failed operation leaves the record unchanged.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SlaError;
use crate::models::{PausedInterval, SlaEvent, SlaRecord, SlaStatus};

/// Status thresholds, as percentages of the metric target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPolicy {
    /// Below this share of target remaining a metric is WARNING
    pub warning_pct: f64,
    /// At or below this share the resolution metric is CRITICAL
    pub resolution_critical_pct: f64,
    /// At or below this share the response metric is CRITICAL.
    /// Zero means response goes straight from WARNING to BREACHED.
    pub response_critical_pct: f64,
    /// Reported remaining time never goes below this (negative) value
    pub remaining_floor_minutes: i64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            warning_pct: 25.0,
            resolution_critical_pct: 10.0,
            response_critical_pct: 0.0,
            remaining_floor_minutes: -10_080,
        }
    }
}

impl ThresholdPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.warning_pct) {
            return Err(format!("warning_pct {} out of range", self.warning_pct));
        }
        for (name, pct) in [
            ("resolution_critical_pct", self.resolution_critical_pct),
            ("response_critical_pct", self.response_critical_pct),
        ] {
            if pct < 0.0 || pct > self.warning_pct {
                return Err(format!(
                    "{} {} must be between 0 and warning_pct {}",
                    name, pct, self.warning_pct
                ));
            }
        }
        if self.remaining_floor_minutes > 0 {
            return Err("remaining_floor_minutes must not be positive".into());
        }
        Ok(())
    }
}

/// Which SLA metric is being classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Response,
    Resolution,
}

/// Classify a metric that has not met its milestone.
///
/// `remaining` and `target` are in seconds.
pub fn classify(metric: Metric, remaining: i64, target: i64, policy: &ThresholdPolicy) -> SlaStatus {
    if remaining <= 0 {
        return SlaStatus::Breached;
    }
    let pct = remaining as f64 / target as f64 * 100.0;
    let critical_pct = match metric {
        Metric::Response => policy.response_critical_pct,
        Metric::Resolution => policy.resolution_critical_pct,
    };
    if pct <= critical_pct {
        SlaStatus::Critical
    } else if pct < policy.warning_pct {
        SlaStatus::Warning
    } else {
        SlaStatus::Normal
    }
}

impl SlaRecord {
    /// Instant the SLA clock is read at: resolution freezes the record.
    pub fn evaluation_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.resolved_at {
            Some(resolved) if resolved < now => resolved,
            _ => now,
        }
    }

    /// Paused time between creation and `at`; an open pause runs up to `at`.
    pub fn paused_duration(&self, at: DateTime<Utc>) -> Duration {
        self.paused_intervals
            .iter()
            .map(|interval| {
                let start = interval.start.max(self.created_at);
                let end = interval.end.unwrap_or(at).min(at);
                if end > start {
                    end - start
                } else {
                    Duration::zero()
                }
            })
            .fold(Duration::zero(), |acc, d| acc + d)
    }

    /// Clock time counted against the SLA at `at`, excluding paused time.
    pub fn effective_elapsed(&self, at: DateTime<Utc>) -> Duration {
        let total = at - self.created_at;
        if total <= Duration::zero() {
            return Duration::zero();
        }
        let elapsed = total - self.paused_duration(at);
        elapsed.max(Duration::zero())
    }

    /// Check the structural invariants of the record.
    pub fn validate(&self) -> Result<(), SlaError> {
        if self.response_time_minutes <= 0 || self.resolution_time_minutes <= 0 {
            return Err(SlaError::MalformedRecord(
                "targets must be positive".into(),
            ));
        }
        for (name, ts) in [
            ("firstResponseAt", self.first_response_at),
            ("resolvedAt", self.resolved_at),
            ("escalatedAt", self.escalated_at),
        ] {
            if matches!(ts, Some(t) if t < self.created_at) {
                return Err(SlaError::MalformedRecord(format!(
                    "{} precedes createdAt",
                    name
                )));
            }
        }

        let mut prev_end: Option<DateTime<Utc>> = None;
        let last = self.paused_intervals.len().saturating_sub(1);
        for (idx, interval) in self.paused_intervals.iter().enumerate() {
            if interval.start < self.created_at {
                return Err(SlaError::MalformedRecord(format!(
                    "pause {} starts before createdAt",
                    idx
                )));
            }
            if matches!(prev_end, Some(end) if interval.start < end) {
                return Err(SlaError::MalformedRecord(format!(
                    "pause {} overlaps the previous pause",
                    idx
                )));
            }
            match interval.end {
                Some(end) if end < interval.start => {
                    return Err(SlaError::MalformedRecord(format!(
                        "pause {} ends before it starts",
                        idx
                    )));
                }
                Some(end) => prev_end = Some(end),
                None if idx != last => {
                    return Err(SlaError::MalformedRecord(format!(
                        "pause {} is open but not the latest",
                        idx
                    )));
                }
                None if self.resolved_at.is_some() => {
                    return Err(SlaError::MalformedRecord(
                        "resolved record has an open pause".into(),
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn last_closed_end(&self) -> Option<DateTime<Utc>> {
        self.paused_intervals.iter().rev().find_map(|i| i.end)
    }

    /// Record the first agent response. Set at most once.
    pub fn record_first_response(&mut self, at: DateTime<Utc>) -> Result<Vec<SlaEvent>, SlaError> {
        if self.first_response_at.is_some() {
            return Err(SlaError::AlreadySet {
                field: "firstResponseAt",
            });
        }
        if self.resolved_at.is_some() {
            return Err(SlaError::TerminalRecord);
        }
        if at < self.created_at {
            return Err(SlaError::InvalidOrder {
                what: "case creation",
            });
        }

        self.first_response_at = Some(at);
        Ok(vec![SlaEvent::FirstResponse {
            case_id: self.case_id,
            at,
        }])
    }

    /// Record resolution. Closes an open pause at `at` and reports it.
    pub fn record_resolution(&mut self, at: DateTime<Utc>) -> Result<Vec<SlaEvent>, SlaError> {
        if self.resolved_at.is_some() {
            return Err(SlaError::AlreadySet {
                field: "resolvedAt",
            });
        }
        if at < self.created_at {
            return Err(SlaError::InvalidOrder {
                what: "case creation",
            });
        }
        if matches!(self.open_interval(), Some(open) if at < open.start) {
            return Err(SlaError::InvalidOrder {
                what: "open pause start",
            });
        }
        if matches!(self.last_closed_end(), Some(end) if at < end) {
            return Err(SlaError::InvalidOrder {
                what: "previous pause end",
            });
        }

        let mut events = Vec::with_capacity(2);
        if let Some(open) = self.paused_intervals.last_mut().filter(|i| i.is_open()) {
            open.end = Some(at);
            events.push(SlaEvent::PauseAutoClosed {
                case_id: self.case_id,
                started_at: open.start,
                at,
            });
        }
        self.resolved_at = Some(at);
        events.push(SlaEvent::Resolved {
            case_id: self.case_id,
            at,
        });
        Ok(events)
    }

    /// Open a pause interval.
    pub fn pause(&mut self, at: DateTime<Utc>, reason: &str) -> Result<Vec<SlaEvent>, SlaError> {
        if self.is_paused() {
            return Err(SlaError::AlreadyPaused);
        }
        if self.resolved_at.is_some() {
            return Err(SlaError::TerminalRecord);
        }
        if at < self.created_at {
            return Err(SlaError::InvalidOrder {
                what: "case creation",
            });
        }
        if matches!(self.last_closed_end(), Some(end) if at < end) {
            return Err(SlaError::InvalidOrder {
                what: "previous pause end",
            });
        }

        self.paused_intervals.push(PausedInterval {
            start: at,
            end: None,
            reason: reason.to_string(),
        });
        Ok(vec![SlaEvent::Paused {
            case_id: self.case_id,
            at,
            reason: reason.to_string(),
        }])
    }

    /// Close the open pause interval.
    pub fn resume(&mut self, at: DateTime<Utc>) -> Result<Vec<SlaEvent>, SlaError> {
        let case_id = self.case_id;
        let open = self
            .paused_intervals
            .last_mut()
            .filter(|i| i.is_open())
            .ok_or(SlaError::NotPaused)?;
        if at < open.start {
            return Err(SlaError::InvalidOrder {
                what: "pause start",
            });
        }

        open.end = Some(at);
        Ok(vec![SlaEvent::Resumed {
            case_id,
            at,
            paused_minutes: (at - open.start).num_minutes(),
        }])
    }

    /// Mark the record escalated. A second call is a no-op with no event.
    pub fn escalate(
        &mut self,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<Vec<SlaEvent>, SlaError> {
        if self.escalated_at.is_some() {
            return Ok(Vec::new());
        }
        if at < self.created_at {
            return Err(SlaError::InvalidOrder {
                what: "case creation",
            });
        }

        self.escalated_at = Some(at);
        Ok(vec![SlaEvent::Escalated {
            case_id: self.case_id,
            at,
            reason: reason.map(str::to_string),
        }])
    }
}
