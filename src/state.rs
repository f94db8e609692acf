//! Application state shared across handlers

use crate::buffer::EventBuffer;
use crate::clock::Clock;
use crate::config::Config;
use crate::models::SlaEvent;
use crate::routes::metrics::Metrics;
use crate::store::CaseStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cases and their SLA records
    pub store: Arc<CaseStore>,
    /// Time source for every request and background tick
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
    /// Outbox of SLA events waiting for the broadcast task
    pub events: EventBuffer,
    /// Broadcast channel feeding WebSocket subscribers
    pub broadcast_tx: broadcast::Sender<SlaEvent>,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create new application state with an empty store
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(config, clock, CaseStore::new())
    }

    pub fn with_store(config: Config, clock: Arc<dyn Clock>, store: CaseStore) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            store: Arc::new(store),
            clock,
            events: EventBuffer::new(config.event_buffer_capacity),
            broadcast_tx,
            metrics: Arc::new(Metrics::new()),
            config: Arc::new(config),
        }
    }

    /// Queue events for broadcast. Events that do not fit are dropped and counted.
    pub fn publish(&self, events: Vec<SlaEvent>) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            debug!(case_id = %event.case_id(), kind = event.kind(), "SLA event");
        }
        let total = events.len() as u64;
        let dropped = self.events.push_all(events) as u64;
        self.metrics.inc_events_published(total - dropped);
        if dropped > 0 {
            self.metrics.inc_events_dropped(dropped);
            warn!(dropped = dropped, "Event buffer full, SLA events dropped");
        }
    }
}
