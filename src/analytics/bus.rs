//! Fan-out of tracked analytics events
//!
//! The store publishes every event it appends, so a host can forward them
//! to an external analytics backend without polling the log.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::event::AnalyticsEvent;

/// Handle returned by [`AnalyticsBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

/// Per-subscriber unbounded channels, owned by one [`FlowStore`](crate::FlowStore)
#[derive(Default)]
pub struct AnalyticsBus {
    senders: RwLock<Vec<(SubscriberId, Sender<AnalyticsEvent>)>>,
    next_id: AtomicUsize,
}

impl AnalyticsBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (Receiver<AnalyticsEvent>, SubscriberId) {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.senders.write().push((id, tx));
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.senders.write().retain(|(sid, _)| *sid != id);
    }

    /// Send a copy of `event` to every subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned.
    pub fn publish(&self, event: &AnalyticsEvent) {
        let mut disconnected = Vec::new();
        for (id, tx) in self.senders.read().iter() {
            if tx.send(event.clone()).is_err() {
                disconnected.push(*id);
            }
        }

        if !disconnected.is_empty() {
            tracing::debug!("Dropping {} disconnected analytics subscriber(s)", disconnected.len());
            self.senders.write().retain(|(id, _)| !disconnected.contains(id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.read().len()
    }

    /// Disconnect every subscriber
    pub fn clear(&self) {
        self.senders.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::EventKind;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = AnalyticsBus::new();
        let (_rx, id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = AnalyticsBus::new();
        let (rx1, _id1) = bus.subscribe();
        let (rx2, _id2) = bus.subscribe();

        bus.publish(&AnalyticsEvent::new("tour", "a", EventKind::Start));

        assert_eq!(rx1.try_recv().unwrap().kind, EventKind::Start);
        assert_eq!(rx2.try_recv().unwrap().step_id, "a");
    }

    #[test]
    fn test_publish_prunes_dropped_receiver() {
        let bus = AnalyticsBus::new();
        let (rx, _id) = bus.subscribe();
        drop(rx);

        bus.publish(&AnalyticsEvent::new("tour", "a", EventKind::Next));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let bus = AnalyticsBus::new();
        let (_rx1, id1) = bus.subscribe();
        let (_rx2, id2) = bus.subscribe();
        assert_ne!(id1, id2);

        bus.unsubscribe(id1);
        let (_rx3, id3) = bus.subscribe();
        assert_ne!(id3, id1);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_clear_disconnects_receivers() {
        let bus = AnalyticsBus::new();
        let (rx, _id) = bus.subscribe();

        bus.clear();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(rx.recv().is_err());
    }
}
