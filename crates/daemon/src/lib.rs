//! `armd`: the multi-session ARMv2 emulator/debugger daemon (§4.8-§4.10).
//!
//! Exposes the session manager, typed event broadcaster, and control API
//! router as a library so both `main` and the `openapi_dump` binary (and
//! integration tests in `arm-testing`) can build the same `axum::Router`.

pub mod api;
pub mod broadcaster;
pub mod config;
pub mod event;
pub mod session;
pub mod tracing_layer;

use broadcaster::Broadcaster;
use config::DaemonConfig;
use session::SessionManager;
use std::sync::Arc;

/// Shared `axum` state: every handler gets a session manager, the event
/// broadcaster, and the resolved daemon configuration.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub broadcaster: Arc<Broadcaster>,
    pub config: Arc<DaemonConfig>,
}

impl AppState {
    pub fn new(config: Arc<DaemonConfig>) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(config.event_channel_capacity));
        let sessions = SessionManager::new(broadcaster.clone(), config.clone());
        sessions.spawn_eviction_task();
        Self { sessions, broadcaster, config }
    }
}
