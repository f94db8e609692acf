//! HTTP surface consumed by the support console BFF

pub mod cases;
pub mod health;
pub mod metrics;
pub mod sla;
pub mod ws;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health and metrics (Kubernetes probes + Prometheus)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        // Cases and triage queue
        .route("/cases", get(cases::list_cases).post(cases::create_case))
        .route("/cases/:case_id", delete(cases::delete_case))
        .route("/cases/:case_id/status", patch(cases::update_case_status))
        // SLA state machine
        .route("/sla/cases/:case_id", get(sla::get_case_sla))
        .route("/sla/cases/:case_id/pause", post(sla::pause))
        .route("/sla/cases/:case_id/resume", post(sla::resume))
        .route("/sla/cases/:case_id/first-response", post(sla::first_response))
        .route("/sla/cases/:case_id/resolve", post(sla::resolve))
        .route("/sla/cases/:case_id/escalate", post(sla::escalate))
        .route("/sla/metrics", get(sla::sla_metrics))
        // WebSocket streaming
        .route("/sla/events", get(ws::ws_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Timestamp for a mutation: the client's `at` if given, else the clock.
///
/// Timestamps in the future are rejected.
pub(crate) fn request_time(state: &AppState, at: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
    let now = state.clock.now();
    match at {
        Some(at) if at > now => Err(AppError::InvalidRequest(format!(
            "timestamp {} is in the future",
            at.to_rfc3339()
        ))),
        Some(at) => Ok(at),
        None => Ok(now),
    }
}
