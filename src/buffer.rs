//! Lock-free outbox for SLA events awaiting broadcast

use crate::models::SlaEvent;
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;

/// Bounded SLA event outbox backed by crossbeam's ArrayQueue.
///
/// Request handlers and the escalation sweep push; the broadcast task drains.
#[derive(Clone)]
pub struct EventBuffer {
    queue: Arc<ArrayQueue<SlaEvent>>,
    capacity: usize,
}

impl EventBuffer {
    /// Create a new buffer with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            capacity,
        }
    }

    /// Try to push an event into the buffer.
    ///
    /// Returns `Err(event)` if the buffer is full.
    pub fn try_push(&self, event: SlaEvent) -> Result<(), SlaEvent> {
        self.queue.push(event)
    }

    /// Push a batch, returning how many events were dropped.
    pub fn push_all(&self, events: impl IntoIterator<Item = SlaEvent>) -> usize {
        events
            .into_iter()
            .map(|event| self.try_push(event))
            .filter(Result::is_err)
            .count()
    }

    /// Pop up to `max` events.
    pub fn pop_batch(&self, max: usize) -> Vec<SlaEvent> {
        let mut batch = Vec::with_capacity(max.min(self.queue.len()));
        for _ in 0..max {
            match self.queue.pop() {
                Some(event) => batch.push(event),
                None => break,
            }
        }
        batch
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
