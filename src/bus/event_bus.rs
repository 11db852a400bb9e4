//! Topic event bus (§4.I): best-effort pub/sub over dotted event-type
//! strings. Built on `tokio::sync::broadcast`, which already gives the
//! wanted semantics for free — a bounded ring buffer per channel, a slow
//! subscriber's oldest unread events dropped rather than the publisher ever
//! blocking.

use crate::domain::events::DomainEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, Mutex};

/// Matches events whose `event_type` starts with a configured prefix (e.g.
/// `"progress."` for every progress event). `None` matches everything.
#[derive(Debug, Clone)]
pub struct EventFilter {
    prefix: String,
}

impl EventFilter {
    pub fn prefix(prefix: impl Into<String>) -> EventFilter {
        EventFilter { prefix: prefix.into() }
    }

    fn matches(&self, event: &DomainEvent) -> bool {
        event.event_type.starts_with(&self.prefix)
    }
}

pub struct Subscription {
    receiver: Mutex<broadcast::Receiver<DomainEvent>>,
    filter: Option<EventFilter>,
    closed: AtomicBool,
}

impl Subscription {
    /// Returns up to `max_items` buffered events without waiting. A lagged
    /// subscriber silently skips the events it missed (the bus's "drop the
    /// oldest" policy) rather than surfacing an error to the caller.
    pub async fn poll(&self, max_items: usize) -> Vec<DomainEvent> {
        if self.closed.load(Ordering::SeqCst) {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(max_items.min(16));
        let mut receiver = self.receiver.lock().await;
        while out.len() < max_items {
            match receiver.try_recv() {
                Ok(event) => {
                    if self.filter.as_ref().map_or(true, |f| f.matches(&event)) {
                        out.push(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => break,
            }
        }
        out
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A process-singleton, held behind an `Arc` by every producer and the
/// progress store.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> EventBus {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    /// Never blocks; a publish with no subscribers is simply dropped.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: Mutex::new(self.sender.subscribe()),
            filter,
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for EventBus {
    fn default() -> EventBus {
        EventBus::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::build;

    #[tokio::test]
    async fn subscription_receives_published_events() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe(None);
        bus.publish(build::recording_resumed("session-1"));

        let events = sub.poll(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "recording.resumed");
    }

    #[tokio::test]
    async fn filter_rejects_events_outside_its_prefix() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe(Some(EventFilter::prefix("progress.")));
        bus.publish(build::recording_resumed("session-1"));

        assert!(sub.poll(10).await.is_empty());
    }

    #[tokio::test]
    async fn closed_subscription_returns_nothing() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe(None);
        sub.close();
        bus.publish(build::recording_resumed("session-1"));

        assert!(sub.poll(10).await.is_empty());
    }
}
