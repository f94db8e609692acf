//! Escalation policy and the periodic sweep that applies it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::aggregator::{aggregate, project, AggregateReport};
use super::state_machine::ThresholdPolicy;
use crate::models::{SlaEvent, SlaStatus};
use crate::store::CaseStore;

/// Reason attached to escalations raised by the sweep
pub const BREACH_REASON: &str = "SLA breached";

/// Escalate only on the transition into BREACHED, and only once.
pub fn should_escalate(previous: SlaStatus, new: SlaStatus, already_escalated: bool) -> bool {
    !already_escalated && previous != SlaStatus::Breached && new == SlaStatus::Breached
}

/// Result of one sweep tick
#[derive(Debug)]
pub struct SweepOutcome {
    pub report: AggregateReport,
    pub escalated: Vec<Uuid>,
    pub events: Vec<SlaEvent>,
}

/// Remembers the last observed overall status per case between ticks.
#[derive(Debug, Default)]
pub struct EscalationSweep {
    last_seen: HashMap<Uuid, SlaStatus>,
}

impl EscalationSweep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last overall status observed for a case, if any
    pub fn last_seen(&self, case_id: Uuid) -> Option<SlaStatus> {
        self.last_seen.get(&case_id).copied()
    }

    /// Evaluate every record at `now` and escalate fresh breaches.
    pub fn run(&mut self, store: &CaseStore, now: DateTime<Utc>, policy: &ThresholdPolicy) -> SweepOutcome {
        let entries = store.snapshot();
        let report = aggregate(entries.iter().map(|e| &e.record), now, policy);

        let mut escalated = Vec::new();
        let mut events = Vec::new();

        for (case_id, derived) in &report.statuses {
            // unseen cases start from NORMAL so an unescalated breach still fires once
            let previous = self.last_seen(*case_id).unwrap_or(SlaStatus::Normal);
            let current = derived.overall_status;

            // resolution ends the SLA; a frozen breach is never escalated
            if derived.resolved_at.is_none() && should_escalate(previous, current, derived.escalated) {
                let result = store.update(*case_id, |entry| {
                    // re-check under the lock; the case may have moved since the snapshot
                    let fresh = project(&entry.record, now, policy)?;
                    if fresh.resolved_at.is_some() || fresh.overall_status != SlaStatus::Breached {
                        return Ok(Vec::new());
                    }
                    entry.record.escalate(now, Some(BREACH_REASON))
                });
                match result {
                    Ok(new_events) if !new_events.is_empty() => {
                        warn!(case_id = %case_id, "SLA breached, case escalated");
                        escalated.push(*case_id);
                        events.extend(new_events);
                    }
                    Ok(_) => {
                        debug!(case_id = %case_id, "Escalation skipped after re-check");
                    }
                    Err(e) => {
                        warn!(case_id = %case_id, error = %e, "Failed to escalate case");
                    }
                }
            }

            self.last_seen.insert(*case_id, current);
        }

        let live: std::collections::HashSet<Uuid> = entries.iter().map(|e| e.case.id).collect();
        self.last_seen.retain(|id, _| live.contains(id));

        SweepOutcome {
            report,
            escalated,
            events,
        }
    }
}
