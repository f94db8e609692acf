//! WebSocket stream of SLA events

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::SlaEvent;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Only stream events for this case
    pub case_id: Option<Uuid>,
}

/// GET /sla/events
///
/// Upgrades the connection to a WebSocket that pushes SLA events as they
/// happen, optionally filtered to one case.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.case_id))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, case_filter: Option<Uuid>) {
    info!(case_id = ?case_filter, "SLA event subscriber connected");
    state.metrics.inc_ws_connections();

    let (mut sender, mut receiver) = socket.split();
    let mut broadcast_rx = state.broadcast_tx.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(event) => {
                    if case_filter.is_some_and(|id| id != event.case_id()) {
                        continue;
                    }
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize SLA event");
                            continue;
                        }
                    };

                    if sender.send(Message::Text(json)).await.is_err() {
                        // Client disconnected
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, some SLA events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    // Drain client frames until it closes
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.metrics.dec_ws_connections();
    info!(case_id = ?case_filter, "SLA event subscriber disconnected");
}

/// Background task that moves events from the outbox to subscribers.
///
/// Runs every 100ms. Escalations are also logged here for the downstream
/// notifier.
pub async fn broadcast_task(state: AppState) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));

    loop {
        interval.tick().await;
        forward_events(&state);
    }
}

/// Forward one batch from the outbox. Returns how many events were taken.
pub fn forward_events(state: &AppState) -> usize {
    let batch = state.events.pop_batch(1000);
    let count = batch.len();
    for event in batch {
        if let SlaEvent::Escalated { case_id, at, reason } = &event {
            info!(case_id = %case_id, at = %at, reason = ?reason, "Escalation ready for notifier");
        }
        // Ignore send errors (no receivers connected)
        let _ = state.broadcast_tx.send(event);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::Config;
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn test_forward_events_reaches_subscribers() {
        let state = AppState::new(Config::default(), Arc::new(SystemClock::new()));
        let mut rx = state.broadcast_tx.subscribe();
        let event = SlaEvent::Resumed {
            case_id: Uuid::from_u128(3),
            at: Utc::now(),
            paused_minutes: 12,
        };
        state.publish(vec![event.clone()]);

        assert_eq!(forward_events(&state), 1);
        assert_eq!(rx.try_recv().unwrap(), event);
        assert!(state.events.is_empty());
    }
}
