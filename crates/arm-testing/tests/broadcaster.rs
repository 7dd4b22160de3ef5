//! "The broadcaster never blocks a publisher; the dropped-count for any
//! subscriber is monotonically non-decreasing." Exercised directly against
//! `armd::broadcaster::Broadcaster` rather than through the control API.

use armd::broadcaster::Broadcaster;
use armd::event::{Event, EventData};
use uuid::Uuid;

fn console_event(session: Uuid) -> Event {
    Event::new(Some(session), EventData::Console { text: "x".into() }, 0)
}

#[tokio::test]
async fn dropped_count_never_decreases_under_repeated_overflow() {
    let bus = Broadcaster::new(1);
    let session = Uuid::new_v4();
    let sub = bus.subscribe(Some(session), None);

    let mut last = 0u64;
    for _ in 0..50 {
        bus.publish(console_event(session));
        let dropped = sub.dropped_count();
        assert!(dropped >= last, "dropped count went backwards: {dropped} < {last}");
        last = dropped;
    }
    assert!(last > 0, "a channel of capacity 1 fed 50 events should have dropped some");
}

#[tokio::test]
async fn publish_with_no_subscribers_does_not_panic() {
    let bus = Broadcaster::new(8);
    bus.publish(console_event(Uuid::new_v4()));
    assert_eq!(bus.subscriber_count(), 0);
}
