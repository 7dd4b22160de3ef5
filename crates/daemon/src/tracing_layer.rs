//! Tracing `Layer` that fans structured log records into the event
//! broadcaster as `LogLine` events (§1 expansion), the same shape as the
//! teacher's `WebSocketLayer` forwarding onto `QemuSupervisor`.

use crate::broadcaster::Broadcaster;
use crate::event::{Event, EventData};
use std::sync::Arc;
use tracing::{Event as TracingEvent, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub struct BroadcastLayer {
    broadcaster: Arc<Broadcaster>,
}

impl BroadcastLayer {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}

impl<S> Layer<S> for BroadcastLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &TracingEvent<'_>, _ctx: Context<'_, S>) {
        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "trace",
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let Some(message) = visitor.message else { return };

        self.broadcaster.publish(Event::new(
            None,
            EventData::LogLine {
                level: level.to_string(),
                target: event.metadata().target().to_string(),
                message,
            },
            chrono::Utc::now().timestamp_millis(),
        ));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}
