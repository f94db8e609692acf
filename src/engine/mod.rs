//! SLA tracking and case triage engine.
//!
//! Everything here is synchronous and takes `now` as an argument; the
//! clock and the store are supplied by the caller.

pub mod aggregator;
pub mod escalation;
pub mod state_machine;
pub mod triage;

pub use aggregator::{aggregate, format_minutes, project, AggregateReport};
pub use escalation::{should_escalate, EscalationSweep, SweepOutcome};
pub use state_machine::ThresholdPolicy;
pub use triage::{triage, SortBy, SortOrder, TriageEntry, TriageQuery, TriageResult};
