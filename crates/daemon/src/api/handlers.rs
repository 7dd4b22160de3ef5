//! Control API handlers (§4.10): translate HTTP requests into
//! [`crate::session::SessionManager`]/[`crate::session::Session`] calls and
//! shape the replies as the DTOs in [`super::types`].

use super::types::*;
use crate::session::{SessionConfig, SessionError};
use crate::AppState;
use arm_debug::{ExecState, WatchKind};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

fn not_found(id: Uuid) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: format!("no such session '{id}'") })).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message.into() })).into_response()
}

fn exec_state_str(state: &ExecState) -> String {
    match state {
        ExecState::Idle => "idle".to_string(),
        ExecState::Running => "running".to_string(),
        ExecState::PausedAtBreakpoint { .. } => "paused_at_breakpoint".to_string(),
        ExecState::PausedAtWatchpoint { .. } => "paused_at_watchpoint".to_string(),
        ExecState::Paused { .. } => "paused".to_string(),
        ExecState::WaitingForInput => "waiting_for_input".to_string(),
        ExecState::Halted { .. } => "halted".to_string(),
        ExecState::Error { .. } => "error".to_string(),
    }
}

fn parse_watch_kind(s: &str) -> Option<WatchKind> {
    match s {
        "read" => Some(WatchKind::Read),
        "write" => Some(WatchKind::Write),
        "read_write" | "readwrite" => Some(WatchKind::ReadWrite),
        _ => None,
    }
}

/// List every live session.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    responses((status = 200, description = "Live session ids", body = SessionListResponse)),
    tag = "sessions"
)]
pub async fn list_sessions(State(app): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse { sessions: app.sessions.list_sessions().await })
}

/// Create a session (§4.8): spins up a fresh `DebugController` and its
/// owning worker task.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    request_body = CreateSessionRequest,
    responses((status = 200, description = "Session created", body = SessionCreatedResponse)),
    tag = "sessions"
)]
pub async fn create_session(
    State(app): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Json<SessionCreatedResponse> {
    let env = req
        .env
        .into_iter()
        .filter_map(|entry| entry.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect();
    let id = app
        .sessions
        .create_session(SessionConfig {
            fs_root: app.config.fs_root.clone(),
            rng_seed: req.rng_seed.unwrap_or(app.config.rng_seed),
            args: req.args,
            env,
        })
        .await;
    Json(SessionCreatedResponse { session_id: id })
}

/// Destroy a session (§4.8 idempotent on unknown ids).
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Session destroyed", body = AckResponse)),
    tag = "sessions"
)]
pub async fn destroy_session(State(app): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    app.sessions.destroy_session(id).await;
    Json(AckResponse { ok: true })
}

macro_rules! session_or_404 {
    ($app:expr, $id:expr) => {
        match $app.sessions.get_session($id).await {
            Some(session) => session,
            None => return not_found($id),
        }
    };
}

/// Assemble and load a program into a session (§4.10 "returns diagnostics
/// and source map").
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/program",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = LoadProgramRequest,
    responses(
        (status = 200, description = "Assembly result", body = LoadProgramResponse),
        (status = 404, description = "No such session", body = ErrorResponse),
    ),
    tag = "program"
)]
pub async fn load_program(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LoadProgramRequest>,
) -> Response {
    let session = session_or_404!(app, id);
    match session.load_program(req.source).await {
        Ok(Ok(outcome)) => Json(LoadProgramResponse {
            ok: true,
            diagnostics: outcome.diagnostics.iter().map(diagnostic_dto).collect(),
            entry_point: Some(outcome.entry_point),
            source_map: outcome
                .source_map
                .into_iter()
                .map(|(address, line, column)| SourceMapEntryDto { address, line, column })
                .collect(),
        })
        .into_response(),
        Ok(Err(diagnostics)) => Json(LoadProgramResponse {
            ok: false,
            diagnostics: diagnostics.iter().map(diagnostic_dto).collect(),
            entry_point: None,
            source_map: Vec::new(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

fn diagnostic_dto(d: &arm_asm::Diagnostic) -> DiagnosticDto {
    DiagnosticDto {
        line: d.line,
        column: d.column,
        severity: format!("{:?}", d.severity).to_lowercase(),
        message: d.message.clone(),
    }
}

/// Resume execution until a breakpoint, watchpoint, halt, error, or an
/// out-of-band pause (§4.10: "ack immediately, state transitions arrive as
/// events").
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/run",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Run request accepted", body = AckResponse)),
    tag = "execution"
)]
pub async fn run(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.run().await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Out-of-band pause (§5): flips the controller's shared atomic flag
/// directly instead of queuing behind an in-flight `run`.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/pause",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Pause requested", body = AckResponse)),
    tag = "execution"
)]
pub async fn pause(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    session.pause();
    Json(AckResponse { ok: true }).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/step",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "One instruction retired", body = AckResponse)),
    tag = "execution"
)]
pub async fn step(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.step().await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/step_over",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Stepped over a call", body = AckResponse)),
    tag = "execution"
)]
pub async fn step_over(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.step_over().await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/step_out",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Ran until the current frame returns", body = AckResponse)),
    tag = "execution"
)]
pub async fn step_out(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.step_out().await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/reset",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Reset to the program's entry point", body = AckResponse)),
    tag = "execution"
)]
pub async fn reset(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.reset().await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/state",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Current execution state", body = ExecStateResponse)),
    tag = "inspection"
)]
pub async fn get_state(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.state().await {
        Ok(state) => Json(ExecStateResponse { state: exec_state_str(&state) }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/registers",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "R0-R15 and CPSR flags", body = RegistersResponse)),
    tag = "inspection"
)]
pub async fn get_registers(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.registers().await {
        Ok((r, n, z, c, v)) => Json(RegistersResponse {
            r,
            pc: r[15],
            cpsr: CpsrDto { n, z, c, v },
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/memory",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("addr" = String, Query, description = "Hex (0x...) or decimal address"),
        ("len" = Option<u32>, Query, description = "Byte length, default 64"),
    ),
    responses((status = 200, description = "Raw bytes as hex", body = MemoryResponse)),
    tag = "inspection"
)]
pub async fn get_memory(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MemoryQuery>,
) -> Response {
    let session = session_or_404!(app, id);
    let addr = match parse_u32(&query.addr) {
        Ok(addr) => addr,
        Err(e) => return bad_request(e),
    };
    match session.memory(addr, query.len).await {
        Ok(bytes) => {
            let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
            Json(MemoryResponse { addr, bytes: hex }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/disassembly",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("addr" = String, Query, description = "Hex (0x...) or decimal address"),
        ("n" = Option<usize>, Query, description = "Instruction count, default 16"),
    ),
    responses((status = 200, description = "Disassembled instructions", body = DisassemblyResponse)),
    tag = "inspection"
)]
pub async fn get_disassembly(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DisassemblyQuery>,
) -> Response {
    let session = session_or_404!(app, id);
    let addr = match parse_u32(&query.addr) {
        Ok(addr) => addr,
        Err(e) => return bad_request(e),
    };
    match session.disassembly(addr, query.n).await {
        Ok(entries) => Json(DisassemblyResponse {
            entries: entries.into_iter().map(|(addr, text)| DisassemblyEntry { addr, text }).collect(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/stack",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("words" = Option<u32>, Query, description = "Word count from SP, default 16"),
    ),
    responses((status = 200, description = "Stack words from SP upward", body = StackResponse)),
    tag = "inspection"
)]
pub async fn get_stack(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StackQuery>,
) -> Response {
    let session = session_or_404!(app, id);
    match session.stack(query.words).await {
        Ok(entries) => Json(StackResponse {
            entries: entries.into_iter().map(|e| StackEntryDto { addr: e.addr, value: e.value }).collect(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/console",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Accumulated console output", body = ConsoleResponse)),
    tag = "inspection"
)]
pub async fn get_console(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.console().await {
        Ok(console) => Json(ConsoleResponse { console }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Deliver stdin (§4.3 configurable batch/interactive delivery). Accepts
/// either UTF-8 `text` or raw `bytesHex`.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/stdin",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SendStdinRequest,
    responses((status = 200, description = "Stdin delivered", body = AckResponse)),
    tag = "execution"
)]
pub async fn send_stdin(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendStdinRequest>,
) -> Response {
    let session = session_or_404!(app, id);
    let bytes = if let Some(hex) = req.bytes_hex {
        match decode_hex(&hex) {
            Ok(bytes) => bytes,
            Err(e) => return bad_request(e),
        }
    } else {
        req.text.unwrap_or_default().into_bytes()
    };
    match session.send_stdin(bytes).await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("bytesHex must have an even number of digits".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("invalid hex byte at {i}: {e}")))
        .collect()
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/breakpoints",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = AddBreakpointRequest,
    responses((status = 200, description = "Breakpoint created", body = BreakpointCreatedResponse)),
    tag = "breakpoints"
)]
pub async fn add_breakpoint(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddBreakpointRequest>,
) -> Response {
    let session = session_or_404!(app, id);
    let addr = match parse_u32(&req.addr) {
        Ok(addr) => addr,
        Err(e) => return bad_request(e),
    };
    match session.add_breakpoint(addr, req.condition, req.temporary).await {
        Ok(id) => Json(BreakpointCreatedResponse { id }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}/breakpoints/{bpId}",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("bpId" = u32, Path, description = "Breakpoint id"),
    ),
    responses((status = 200, description = "Breakpoint removed", body = AckResponse)),
    tag = "breakpoints"
)]
pub async fn remove_breakpoint(State(app): State<AppState>, Path((id, bp_id)): Path<(Uuid, u32)>) -> Response {
    let session = session_or_404!(app, id);
    match session.remove_breakpoint(bp_id).await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/breakpoints",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "All breakpoints", body = BreakpointListResponse)),
    tag = "breakpoints"
)]
pub async fn list_breakpoints(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.breakpoints().await {
        Ok(breakpoints) => Json(BreakpointListResponse {
            breakpoints: breakpoints
                .into_iter()
                .map(|b| BreakpointDto {
                    id: b.id,
                    addr: b.addr,
                    enabled: b.enabled,
                    condition: b.condition,
                    hit_count: b.hit_count,
                    temporary: b.temporary,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/watchpoints",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = AddWatchpointRequest,
    responses((status = 200, description = "Watchpoint created", body = WatchpointCreatedResponse)),
    tag = "watchpoints"
)]
pub async fn add_watchpoint(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddWatchpointRequest>,
) -> Response {
    let session = session_or_404!(app, id);
    let addr = match parse_u32(&req.addr) {
        Ok(addr) => addr,
        Err(e) => return bad_request(e),
    };
    let Some(kind) = parse_watch_kind(&req.kind) else {
        return bad_request(format!("invalid watchpoint kind '{}'", req.kind));
    };
    let len = req.len.max(1);
    match session.add_watchpoint((addr, addr.wrapping_add(len)), kind).await {
        Ok(id) => Json(WatchpointCreatedResponse { id }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}/watchpoints/{wpId}",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("wpId" = u32, Path, description = "Watchpoint id"),
    ),
    responses((status = 200, description = "Watchpoint removed", body = AckResponse)),
    tag = "watchpoints"
)]
pub async fn remove_watchpoint(State(app): State<AppState>, Path((id, wp_id)): Path<(Uuid, u32)>) -> Response {
    let session = session_or_404!(app, id);
    match session.remove_watchpoint(wp_id).await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/watchpoints",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "All watchpoints", body = WatchpointListResponse)),
    tag = "watchpoints"
)]
pub async fn list_watchpoints(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.watchpoints().await {
        Ok(watchpoints) => Json(WatchpointListResponse {
            watchpoints: watchpoints
                .into_iter()
                .map(|w| WatchpointDto {
                    id: w.id,
                    start: w.addr_range.0,
                    end: w.addr_range.1,
                    kind: match w.kind {
                        WatchKind::Read => "read",
                        WatchKind::Write => "write",
                        WatchKind::ReadWrite => "read_write",
                    }
                    .to_string(),
                    enabled: w.enabled,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Evaluate a debugger expression (§4.6): registers, CPSR flags, memory
/// dereferences, symbols, and the standard C operators.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/evaluate",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = EvaluateRequest,
    responses((status = 200, description = "Evaluation result", body = EvaluateResponse)),
    tag = "inspection"
)]
pub async fn evaluate(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EvaluateRequest>,
) -> Response {
    let session = session_or_404!(app, id);
    match session.evaluate(req.expression).await {
        Ok(Ok(value)) => Json(EvaluateResponse { ok: true, value: Some(value), error: None }).into_response(),
        Ok(Err(err)) => Json(EvaluateResponse { ok: false, value: None, error: Some(err.to_string()) }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Memory/flag/stack/register traces plus coverage (§4.7), each carrying
/// its own `.to_json()` shape.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/traces",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "All trace engines", body = TracesResponse)),
    tag = "inspection"
)]
pub async fn get_traces(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.traces().await {
        Ok(traces) => Json(TracesResponse {
            memory: traces.memory,
            flags: traces.flags,
            stack: traces.stack,
            registers: traces.registers,
            coverage: traces.coverage,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/history",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 200, description = "Command history ring buffer", body = HistoryResponse)),
    tag = "inspection"
)]
pub async fn get_history(State(app): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let session = session_or_404!(app, id);
    match session.history().await {
        Ok(entries) => Json(HistoryResponse {
            entries: entries.into_iter().map(|(command, result)| HistoryEntryDto { command, result }).collect(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
