//! API routing (§4.10): wires [`super::handlers`] and [`super::ws`] into an
//! `axum::Router<AppState>`, with the request-id middleware, permissive
//! CORS, and a Swagger UI mounted from a trimmed `utoipa::OpenApi`.

use super::{handlers, middleware, types, ws};
use crate::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_sessions,
        handlers::create_session,
        handlers::destroy_session,
        handlers::load_program,
        handlers::run,
        handlers::pause,
        handlers::step,
        handlers::step_over,
        handlers::step_out,
        handlers::reset,
        handlers::get_state,
        handlers::get_registers,
        handlers::get_memory,
        handlers::get_disassembly,
        handlers::get_stack,
        handlers::get_console,
        handlers::send_stdin,
        handlers::add_breakpoint,
        handlers::remove_breakpoint,
        handlers::list_breakpoints,
        handlers::add_watchpoint,
        handlers::remove_watchpoint,
        handlers::list_watchpoints,
        handlers::evaluate,
        handlers::get_traces,
        handlers::get_history,
    ),
    components(schemas(
        types::ErrorResponse,
        types::SessionCreatedResponse,
        types::CreateSessionRequest,
        types::SessionListResponse,
        types::LoadProgramRequest,
        types::DiagnosticDto,
        types::SourceMapEntryDto,
        types::LoadProgramResponse,
        types::AckResponse,
        types::ExecStateResponse,
        types::RegistersResponse,
        types::CpsrDto,
        types::MemoryResponse,
        types::DisassemblyEntry,
        types::DisassemblyResponse,
        types::StackEntryDto,
        types::StackResponse,
        types::AddBreakpointRequest,
        types::BreakpointCreatedResponse,
        types::BreakpointDto,
        types::BreakpointListResponse,
        types::AddWatchpointRequest,
        types::WatchpointCreatedResponse,
        types::WatchpointDto,
        types::WatchpointListResponse,
        types::EvaluateRequest,
        types::EvaluateResponse,
        types::SendStdinRequest,
        types::ConsoleResponse,
        types::TracesResponse,
        types::HistoryEntryDto,
        types::HistoryResponse,
    )),
    tags(
        (name = "sessions", description = "Session lifecycle"),
        (name = "program", description = "Assembling and loading programs"),
        (name = "execution", description = "Run/step/pause control"),
        (name = "inspection", description = "Registers, memory, disassembly, traces"),
        (name = "breakpoints", description = "Breakpoint management"),
        (name = "watchpoints", description = "Watchpoint management"),
    ),
    info(
        title = "armd - ARMv2 emulator/debugger daemon",
        version = "0.1.0",
        description = "Multi-session control API for the ARMv2 emulator, assembler, and debugger",
    )
)]
struct ApiDoc;

/// Exposed so `bin/openapi_dump.rs` can freeze the same schema the router
/// serves, without redeclaring the `#[derive(OpenApi)]` struct.
pub fn api_doc() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/api/v1/sessions", get(handlers::list_sessions).post(handlers::create_session))
        .route("/api/v1/sessions/:id", delete(handlers::destroy_session))
        .route("/api/v1/sessions/:id/program", post(handlers::load_program))
        .route("/api/v1/sessions/:id/run", post(handlers::run))
        .route("/api/v1/sessions/:id/pause", post(handlers::pause))
        .route("/api/v1/sessions/:id/step", post(handlers::step))
        .route("/api/v1/sessions/:id/step_over", post(handlers::step_over))
        .route("/api/v1/sessions/:id/step_out", post(handlers::step_out))
        .route("/api/v1/sessions/:id/reset", post(handlers::reset))
        .route("/api/v1/sessions/:id/state", get(handlers::get_state))
        .route("/api/v1/sessions/:id/registers", get(handlers::get_registers))
        .route("/api/v1/sessions/:id/memory", get(handlers::get_memory))
        .route("/api/v1/sessions/:id/disassembly", get(handlers::get_disassembly))
        .route("/api/v1/sessions/:id/stack", get(handlers::get_stack))
        .route("/api/v1/sessions/:id/console", get(handlers::get_console))
        .route("/api/v1/sessions/:id/stdin", post(handlers::send_stdin))
        .route(
            "/api/v1/sessions/:id/breakpoints",
            get(handlers::list_breakpoints).post(handlers::add_breakpoint),
        )
        .route("/api/v1/sessions/:id/breakpoints/:bp_id", delete(handlers::remove_breakpoint))
        .route(
            "/api/v1/sessions/:id/watchpoints",
            get(handlers::list_watchpoints).post(handlers::add_watchpoint),
        )
        .route("/api/v1/sessions/:id/watchpoints/:wp_id", delete(handlers::remove_watchpoint))
        .route("/api/v1/sessions/:id/evaluate", post(handlers::evaluate))
        .route("/api/v1/sessions/:id/traces", get(handlers::get_traces))
        .route("/api/v1/sessions/:id/history", get(handlers::get_history))
        .route("/events", get(ws::events_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(CorsLayer::permissive())
}
