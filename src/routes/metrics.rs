//! Prometheus metrics endpoint

use axum::{extract::State, response::IntoResponse};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::aggregate;
use crate::state::AppState;

/// Application metrics for Prometheus
#[derive(Default)]
pub struct Metrics {
    cases_created_total: AtomicU64,
    cases_deleted_total: AtomicU64,
    /// Successful SLA mutations (pause, resume, response, resolution, escalate)
    mutations_total: AtomicU64,
    /// Mutations rejected with a typed SLA error
    mutations_rejected_total: AtomicU64,
    escalations_total: AtomicU64,
    events_published_total: AtomicU64,
    events_dropped_total: AtomicU64,
    sweeps_total: AtomicU64,
    ws_connections: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_cases_created(&self) {
        self.cases_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cases_deleted(&self) {
        self.cases_deleted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mutations(&self) {
        self.mutations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mutations_rejected(&self) {
        self.mutations_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalations(&self, count: u64) {
        self.escalations_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_events_published(&self, count: u64) {
        self.events_published_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_events_dropped(&self, count: u64) {
        self.events_dropped_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_sweeps(&self) {
        self.sweeps_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ws_connections(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_ws_connections(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cases_created_total: self.cases_created_total.load(Ordering::Relaxed),
            cases_deleted_total: self.cases_deleted_total.load(Ordering::Relaxed),
            mutations_total: self.mutations_total.load(Ordering::Relaxed),
            mutations_rejected_total: self.mutations_rejected_total.load(Ordering::Relaxed),
            escalations_total: self.escalations_total.load(Ordering::Relaxed),
            events_published_total: self.events_published_total.load(Ordering::Relaxed),
            events_dropped_total: self.events_dropped_total.load(Ordering::Relaxed),
            sweeps_total: self.sweeps_total.load(Ordering::Relaxed),
            ws_connections: self.ws_connections.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct MetricsSnapshot {
    pub cases_created_total: u64,
    pub cases_deleted_total: u64,
    pub mutations_total: u64,
    pub mutations_rejected_total: u64,
    pub escalations_total: u64,
    pub events_published_total: u64,
    pub events_dropped_total: u64,
    pub sweeps_total: u64,
    pub ws_connections: u64,
}

/// GET /metrics
///
/// Returns Prometheus-format counters plus live fleet SLA gauges
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_metrics();
    let entries = state.store.snapshot();
    let fleet = aggregate(
        entries.iter().map(|e| &e.record),
        state.clock.now(),
        &state.config.thresholds,
    )
    .metrics;

    let output = format!(
        r#"# HELP sla_cases_created_total Total number of cases created
# TYPE sla_cases_created_total counter
sla_cases_created_total {}

# HELP sla_cases_deleted_total Total number of cases deleted
# TYPE sla_cases_deleted_total counter
sla_cases_deleted_total {}

# HELP sla_mutations_total Total number of accepted SLA mutations
# TYPE sla_mutations_total counter
sla_mutations_total {}

# HELP sla_mutations_rejected_total Total number of SLA mutations rejected with a typed error
# TYPE sla_mutations_rejected_total counter
sla_mutations_rejected_total {}

# HELP sla_escalations_total Total number of escalations raised
# TYPE sla_escalations_total counter
sla_escalations_total {}

# HELP sla_events_published_total Total number of SLA events queued for broadcast
# TYPE sla_events_published_total counter
sla_events_published_total {}

# HELP sla_events_dropped_total Total number of SLA events dropped due to buffer full
# TYPE sla_events_dropped_total counter
sla_events_dropped_total {}

# HELP sla_sweeps_total Total number of escalation sweeps run
# TYPE sla_sweeps_total counter
sla_sweeps_total {}

# HELP sla_event_buffer_depth Current number of events in buffer
# TYPE sla_event_buffer_depth gauge
sla_event_buffer_depth {}

# HELP sla_websocket_connections Current number of active WebSocket connections
# TYPE sla_websocket_connections gauge
sla_websocket_connections {}

# HELP sla_cases_active Cases whose SLA is not completed
# TYPE sla_cases_active gauge
sla_cases_active {}

# HELP sla_cases_at_risk Cases in WARNING or CRITICAL
# TYPE sla_cases_at_risk gauge
sla_cases_at_risk {}

# HELP sla_cases_breached Cases with a breached SLA
# TYPE sla_cases_breached gauge
sla_cases_breached {}

# HELP sla_cases_paused Cases with a paused SLA clock
# TYPE sla_cases_paused gauge
sla_cases_paused {}

# HELP sla_records_unprojectable SLA records that failed projection
# TYPE sla_records_unprojectable gauge
sla_records_unprojectable {}

# HELP sla_triage_info Build information
# TYPE sla_triage_info gauge
sla_triage_info{{version="{}"}} 1
"#,
        snapshot.cases_created_total,
        snapshot.cases_deleted_total,
        snapshot.mutations_total,
        snapshot.mutations_rejected_total,
        snapshot.escalations_total,
        snapshot.events_published_total,
        snapshot.events_dropped_total,
        snapshot.sweeps_total,
        state.events.len(),
        snapshot.ws_connections,
        fleet.total_active,
        fleet.at_risk_count,
        fleet.breached_count,
        fleet.paused_count,
        fleet.failed_count,
        env!("CARGO_PKG_VERSION"),
    );

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
