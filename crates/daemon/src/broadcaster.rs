//! Typed pub/sub event bus (§4.9): subscribers filter by session id and by
//! event kind; delivery is through a bounded per-subscriber channel that is
//! never allowed to block a publisher — a full channel drops the message
//! and increments that subscriber's dropped count instead (§5 "the
//! broadcaster's bounded-channel fan-out with drop-on-full keeps the run
//! worker non-blocking").
//!
//! Order guarantee: within one session and one event kind, delivery order
//! to a given subscriber matches production order, because each session
//! publishes from its own single worker and `try_send` preserves FIFO order
//! on the underlying channel.

use crate::event::{Event, EventKind};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

struct Subscriber {
    id: u64,
    session_filter: Option<Uuid>,
    kind_filter: Option<HashSet<EventKind>>,
    sender: mpsc::Sender<Arc<Event>>,
    dropped: Arc<AtomicU64>,
}

impl Subscriber {
    fn matches(&self, event: &Event) -> bool {
        if let Some(sid) = self.session_filter {
            if event.session_id != Some(sid) {
                return false;
            }
        }
        if let Some(kinds) = &self.kind_filter {
            if !kinds.contains(&event.data.kind()) {
                return false;
            }
        }
        true
    }
}

/// A live subscription handle returned by [`Broadcaster::subscribe`]. Holds
/// the receiving end of the channel plus a handle to this subscriber's
/// dropped-message counter (§4.9 "records a dropped-message count").
pub struct Subscription {
    id: u64,
    pub receiver: mpsc::Receiver<Arc<Event>>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Shared across every session and the control API; producers publish via
/// a lock-free-for-the-hot-path `try_send` onto each matching subscriber's
/// channel (§5 "the broadcaster's subscriber set is protected by a
/// dedicated lock; producers publish ... onto each subscriber's bounded
/// channel").
pub struct Broadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    channel_capacity: usize,
}

impl Broadcaster {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Register a new subscriber. `session_filter = None` receives events
    /// from every session; `kind_filter = None` receives every event kind.
    pub fn subscribe(
        &self,
        session_filter: Option<Uuid>,
        kind_filter: Option<HashSet<EventKind>>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers.lock().expect("broadcaster mutex poisoned").push(Subscriber {
            id,
            session_filter,
            kind_filter,
            sender: tx,
            dropped: dropped.clone(),
        });
        Subscription { id, receiver: rx, dropped }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.subscribers
            .lock()
            .expect("broadcaster mutex poisoned")
            .retain(|s| s.id != subscription.id);
    }

    /// Publish to every matching subscriber. Never blocks: a full channel
    /// drops the event for that subscriber and bumps its dropped counter,
    /// which is monotonically non-decreasing (§8 testable property).
    pub fn publish(&self, event: Event) {
        let event = Arc::new(event);
        let subscribers = self.subscribers.lock().expect("broadcaster mutex poisoned");
        for sub in subscribers.iter() {
            if !sub.matches(&event) {
                continue;
            }
            if sub.sender.try_send(event.clone()).is_err() {
                sub.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("broadcaster mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventData;

    fn console_event(session: Uuid) -> Event {
        Event::new(Some(session), EventData::Console { text: "hi".into() }, 0)
    }

    #[tokio::test]
    async fn subscriber_receives_matching_session_events_only() {
        let bus = Broadcaster::new(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut sub = bus.subscribe(Some(a), None);
        bus.publish(console_event(a));
        bus.publish(console_event(b));
        let received = sub.receiver.recv().await.unwrap();
        assert_eq!(received.session_id, Some(a));
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_and_counts_without_blocking() {
        let bus = Broadcaster::new(1);
        let session = Uuid::new_v4();
        let sub = bus.subscribe(Some(session), None);
        bus.publish(console_event(session));
        bus.publish(console_event(session));
        bus.publish(console_event(session));
        assert_eq!(sub.dropped_count(), 2);
    }

    #[tokio::test]
    async fn kind_filter_excludes_other_kinds() {
        let bus = Broadcaster::new(8);
        let session = Uuid::new_v4();
        let mut kinds = HashSet::new();
        kinds.insert(EventKind::StdinRequest);
        let mut sub = bus.subscribe(Some(session), Some(kinds));
        bus.publish(console_event(session));
        bus.publish(Event::new(Some(session), EventData::StdinRequest, 0));
        let received = sub.receiver.recv().await.unwrap();
        assert!(matches!(received.data, EventData::StdinRequest));
        assert!(sub.receiver.try_recv().is_err());
    }
}
