//! `armd`: the multi-session ARMv2 emulator/debugger daemon (§4.8-§4.10).
//!
//! Exposes a control API and `/events` WebSocket stream over the ARMv2
//! emulator, assembler, and debug controller built by the other crates in
//! this workspace.
//!
//! Default bind: 127.0.0.1:7878 (override with `ARMD_BIND`)
//! WebSocket: /events
//! REST API: /api/v1/*

use anyhow::Result;
use armd::config::DaemonConfig;
use armd::{api, tracing_layer, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(DaemonConfig::from_env()?);
    let state = AppState::new(config.clone());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .with(tracing_layer::BroadcastLayer::new(state.broadcaster.clone()))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,armd=debug")))
        .init();

    info!("starting armd");
    info!(version = env!("CARGO_PKG_VERSION"));
    info!(bind = %config.bind_addr);

    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    info!("armd listening on http://{}", config.bind_addr);
    info!("websocket events: ws://{}/events", config.bind_addr);
    info!("swagger ui: http://{}/swagger-ui", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
