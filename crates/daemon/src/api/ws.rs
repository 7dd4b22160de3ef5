//! WebSocket event streaming (§4.10 `subscribe(sessionId?, kinds?)`): a
//! thin adapter from [`crate::broadcaster::Subscription`] onto a socket,
//! in the same shape as the teacher's `events_handler` but built on the
//! bounded-mpsc broadcaster instead of `tokio::sync::broadcast`.

use super::types::SubscribeQuery;
use crate::event::EventKind;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use std::collections::HashSet;
use tracing::{debug, error, info};

pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Response {
    let kind_filter = query.kinds.as_deref().map(|raw| {
        raw.split(',')
            .filter_map(|s| EventKind::parse(s.trim()))
            .collect::<HashSet<_>>()
    });
    ws.on_upgrade(move |socket| handle_socket(socket, app, query.session_id, kind_filter))
}

async fn handle_socket(
    mut socket: WebSocket,
    app: AppState,
    session_filter: Option<uuid::Uuid>,
    kind_filter: Option<HashSet<EventKind>>,
) {
    info!("event stream client connected");
    let mut subscription = app.broadcaster.subscribe(session_filter, kind_filter);
    let mut last_reported_dropped = 0u64;

    loop {
        tokio::select! {
            event = subscription.receiver.recv() => {
                let Some(event) = event else {
                    debug!("broadcaster closed its sender, ending stream");
                    break;
                };

                let dropped = subscription.dropped_count();
                if dropped > last_reported_dropped {
                    let notice = serde_json::json!({
                        "type": "backpressure",
                        "droppedCount": dropped,
                        "ts": chrono::Utc::now().timestamp_millis(),
                    });
                    last_reported_dropped = dropped;
                    if let Ok(json) = serde_json::to_string(&notice) {
                        let _ = socket.send(Message::Text(json)).await;
                    }
                }

                match serde_json::to_string(event.as_ref()) {
                    Ok(json) => {
                        if let Err(e) = socket.send(Message::Text(json)).await {
                            error!("failed to send event to client: {e}");
                            break;
                        }
                    }
                    Err(e) => error!("failed to serialize event: {e}"),
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("event stream client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("websocket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    app.broadcaster.unsubscribe(&subscription);
}
