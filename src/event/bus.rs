//! In-process publish/subscribe channel for engine events.
//!
//! Backed by a tokio broadcast channel: publishing never blocks the producer,
//! and a subscriber that falls behind loses its *oldest* undelivered events
//! (lossy-oldest backpressure). This is a monitoring path — recency beats
//! completeness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::{Event, EventFilter};

/// Fan-out event bus. All subscribers receive every matching event published
/// after they subscribed; there is no historical replay.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    dropped_total: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus whose per-subscriber delivery queue holds `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            dropped_total: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Never blocks. Send fails only when there are zero subscribers,
    /// which is fine — the event is simply dropped.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event published after this call.
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_filtered(None)
    }

    /// Subscribe with a filter; non-matching events are skipped silently.
    pub fn subscribe_filtered(&self, filter: impl Into<Option<EventFilter>>) -> Subscription {
        Subscription {
            rx: self.sender.subscribe(),
            filter: filter.into(),
            dropped: 0,
            bus_dropped: Arc::clone(&self.dropped_total),
        }
    }

    /// Total events dropped across all subscribers due to backpressure.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Handle yielding a lazy sequence of matching events.
///
/// Dropping the handle unsubscribes and releases the delivery queue;
/// re-subscribing starts a fresh sequence (no replay of missed events).
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    filter: Option<EventFilter>,
    dropped: u64,
    bus_dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Receive the next matching event, waiting if none is queued.
    ///
    /// Returns `None` once the bus has been dropped and the queue drained.
    /// Events evicted by backpressure are counted, not delivered.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.record_dropped(skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when the queue
    /// holds no matching event right now.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    self.record_dropped(skipped);
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events this subscription lost to lossy-oldest eviction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn matches(&self, event: &Event) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(event))
    }

    fn record_dropped(&mut self, skipped: u64) {
        self.dropped += skipped;
        self.bus_dropped.fetch_add(skipped, Ordering::Relaxed);
        debug!(skipped = skipped, "Subscriber lagged, oldest events dropped");
    }
}
