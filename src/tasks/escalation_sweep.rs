//! Escalation sweep task - re-evaluates every SLA and escalates fresh breaches

use tracing::{debug, info, warn};

use crate::engine::EscalationSweep;
use crate::state::AppState;

/// Background task that periodically evaluates all records at one instant.
///
/// Each tick aggregates the whole store, escalates cases that just entered
/// BREACHED and publishes the resulting events.
pub async fn escalation_sweep_task(state: AppState) {
    let period = state.config.sweep_interval;
    let mut interval = tokio::time::interval(period);
    let mut sweep = EscalationSweep::new();

    info!(interval_secs = period.as_secs(), "Escalation sweep task started");

    loop {
        interval.tick().await;
        run_sweep(&state, &mut sweep);
    }
}

/// Run one sweep tick against the shared state. Returns the number of escalations.
pub fn run_sweep(state: &AppState, sweep: &mut EscalationSweep) -> usize {
    let now = state.clock.now();
    let outcome = sweep.run(&state.store, now, &state.config.thresholds);
    state.metrics.inc_sweeps();

    for failure in &outcome.report.failures {
        warn!(case_id = %failure.case_id, cause = %failure.cause, "SLA record could not be evaluated");
    }

    let escalated = outcome.escalated.len();
    if escalated > 0 {
        state.metrics.inc_escalations(escalated as u64);
        info!(escalated = escalated, "Escalated breached cases");
    }
    state.publish(outcome.events);

    let metrics = outcome.report.metrics;
    debug!(
        active = metrics.total_active,
        at_risk = metrics.at_risk_count,
        breached = metrics.breached_count,
        failed = metrics.failed_count,
        "Escalation sweep complete"
    );
    escalated
}
