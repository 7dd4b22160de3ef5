//! Session manager (§4.8): per-session VM + debug-controller lifecycle, a
//! single owning worker per session that serializes every control
//! operation, and idle eviction.
//!
//! Mirrors the teacher's `QemuSupervisor`: one background task drives a
//! hosted process (there, QEMU; here, a [`arm_debug::DebugController`]) and
//! every control operation is turned into a message on that task's inbound
//! queue (§4.8 "control operations from the API are converted to requests
//! placed on the session's inbound queue, processed in arrival order").
//! `pause` is the one exception: it is delivered out-of-band through the
//! controller's own atomic pause flag so it can interrupt a `run` in
//! progress without waiting behind it in the queue (§5 "a pause flag is
//! checked at every instruction boundary").

use crate::broadcaster::Broadcaster;
use crate::config::DaemonConfig;
use crate::event::{Event, EventData};
use arm_debug::{Breakpoint, DebugController, EvalError, ExecState, WatchKind, Watchpoint};
use arm_syscall::SyscallConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub fs_root: PathBuf,
    pub rng_seed: u64,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

pub struct LoadOutcome {
    pub diagnostics: Vec<arm_asm::Diagnostic>,
    pub entry_point: u32,
    pub source_map: Vec<(u32, usize, usize)>,
}

pub struct StackEntry {
    pub addr: u32,
    pub value: u32,
}

pub struct Traces {
    pub memory: serde_json::Value,
    pub flags: serde_json::Value,
    pub stack: serde_json::Value,
    pub registers: serde_json::Value,
    pub coverage: serde_json::Value,
}

type Reply<T> = oneshot::Sender<T>;

enum SessionRequest {
    LoadProgram(String, Reply<Result<LoadOutcome, Vec<arm_asm::Diagnostic>>>),
    Run(Reply<()>),
    Step(Reply<()>),
    StepOver(Reply<()>),
    StepOut(Reply<()>),
    Reset(Reply<()>),
    AddBreakpoint {
        addr: u32,
        condition: Option<String>,
        temporary: bool,
        reply: Reply<u32>,
    },
    RemoveBreakpoint(u32, Reply<()>),
    AddWatchpoint {
        range: (u32, u32),
        kind: WatchKind,
        reply: Reply<u32>,
    },
    RemoveWatchpoint(u32, Reply<()>),
    Evaluate(String, Reply<Result<u32, EvalError>>),
    SendStdin(Vec<u8>, Reply<()>),
    GetRegisters(Reply<([u32; 16], bool, bool, bool, bool)>),
    GetMemory(u32, u32, Reply<Vec<u8>>),
    GetDisassembly(u32, usize, Reply<Vec<(u32, String)>>),
    GetStack(u32, Reply<Vec<StackEntry>>),
    GetConsole(Reply<String>),
    GetState(Reply<ExecState>),
    ListBreakpoints(Reply<Vec<Breakpoint>>),
    ListWatchpoints(Reply<Vec<Watchpoint>>),
    GetTraces(Reply<Traces>),
    GetHistory(Reply<Vec<(String, String)>>),
}

fn watch_kind_str(kind: WatchKind) -> &'static str {
    match kind {
        WatchKind::Read => "read",
        WatchKind::Write => "write",
        WatchKind::ReadWrite => "read_write",
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs on its own Tokio task; owns the `DebugController` exclusively, so
/// no lock is needed around it (§5 "only the run worker mutates them").
struct Worker {
    session_id: Uuid,
    controller: DebugController,
    broadcaster: Arc<Broadcaster>,
    console_len: usize,
}

impl Worker {
    fn handle(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::LoadProgram(source, reply) => {
                let result = self.controller.load_program(&source);
                let _ = reply.send(match result {
                    Ok(diagnostics) => Ok(LoadOutcome {
                        diagnostics,
                        entry_point: self.controller.entry_point(),
                        source_map: self
                            .controller
                            .source_map()
                            .iter()
                            .map(|e| (e.address, e.line, e.column))
                            .collect(),
                    }),
                    Err(diagnostics) => Err(diagnostics),
                });
                self.console_len = 0;
                self.publish_console_delta();
            }
            SessionRequest::Run(reply) => {
                let from = self.controller.state().clone();
                self.controller.continue_run();
                let _ = reply.send(());
                self.after_step(&from);
            }
            SessionRequest::Step(reply) => {
                let from = self.controller.state().clone();
                self.controller.step();
                let _ = reply.send(());
                self.after_step(&from);
                self.tick();
            }
            SessionRequest::StepOver(reply) => {
                let from = self.controller.state().clone();
                self.controller.step_over();
                let _ = reply.send(());
                self.after_step(&from);
                self.tick();
            }
            SessionRequest::StepOut(reply) => {
                let from = self.controller.state().clone();
                self.controller.step_out();
                let _ = reply.send(());
                self.after_step(&from);
            }
            SessionRequest::Reset(reply) => {
                let from = self.controller.state().clone();
                self.controller.reset_to_entry();
                let _ = reply.send(());
                self.after_step(&from);
            }
            SessionRequest::AddBreakpoint { addr, condition, temporary, reply } => {
                let id = self.controller.add_breakpoint(addr, condition, temporary);
                let _ = reply.send(id);
            }
            SessionRequest::RemoveBreakpoint(id, reply) => {
                self.controller.remove_breakpoint(id);
                let _ = reply.send(());
            }
            SessionRequest::AddWatchpoint { range, kind, reply } => {
                let id = self.controller.add_watchpoint(range, kind);
                let _ = reply.send(id);
            }
            SessionRequest::RemoveWatchpoint(id, reply) => {
                self.controller.remove_watchpoint(id);
                let _ = reply.send(());
            }
            SessionRequest::Evaluate(expr, reply) => {
                let _ = reply.send(self.controller.evaluate(&expr));
            }
            SessionRequest::SendStdin(bytes, reply) => {
                let from = self.controller.state().clone();
                self.controller.send_stdin(&bytes);
                let _ = reply.send(());
                self.after_step(&from);
            }
            SessionRequest::GetRegisters(reply) => {
                let cpsr = self.controller.cpsr();
                let _ = reply.send((self.controller.registers(), cpsr.n, cpsr.z, cpsr.c, cpsr.v));
            }
            SessionRequest::GetMemory(addr, len, reply) => {
                let _ = reply.send(self.controller.read_memory(addr, len));
            }
            SessionRequest::GetDisassembly(addr, n, reply) => {
                let _ = reply.send(self.controller.disassembly(addr, n));
            }
            SessionRequest::GetStack(words, reply) => {
                let entries = self
                    .controller
                    .stack_snapshot(words)
                    .into_iter()
                    .map(|(addr, value)| StackEntry { addr, value })
                    .collect();
                let _ = reply.send(entries);
            }
            SessionRequest::GetConsole(reply) => {
                let _ = reply.send(self.controller.console());
            }
            SessionRequest::GetState(reply) => {
                let _ = reply.send(self.controller.state().clone());
            }
            SessionRequest::ListBreakpoints(reply) => {
                let _ = reply.send(self.controller.breakpoints().to_vec());
            }
            SessionRequest::ListWatchpoints(reply) => {
                let _ = reply.send(self.controller.watchpoints());
            }
            SessionRequest::GetTraces(reply) => {
                let _ = reply.send(Traces {
                    memory: self.controller.memory_trace().to_json(),
                    flags: self.controller.flag_trace().to_json(),
                    stack: self.controller.stack_trace().to_json(),
                    registers: self.controller.register_trace().to_json(),
                    coverage: self.controller.coverage().to_json(),
                });
            }
            SessionRequest::GetHistory(reply) => {
                let entries = self
                    .controller
                    .history()
                    .iter()
                    .map(|e| (e.command.clone(), e.result.clone()))
                    .collect();
                let _ = reply.send(entries);
            }
        }
    }

    fn after_step(&mut self, from: &ExecState) {
        let to = self.controller.state().clone();
        if from != &to {
            self.broadcaster.publish(Event::new(
                Some(self.session_id),
                EventData::State { from: format!("{from:?}"), to: format!("{to:?}") },
                now_ms(),
            ));
            match &to {
                ExecState::PausedAtBreakpoint { breakpoint_id, pc } => {
                    self.broadcaster.publish(Event::new(
                        Some(self.session_id),
                        EventData::BreakpointHit { breakpoint_id: *breakpoint_id, pc: *pc },
                        now_ms(),
                    ));
                }
                ExecState::PausedAtWatchpoint { hit } => {
                    let kind = self
                        .controller
                        .watchpoints()
                        .iter()
                        .find(|w| w.id == hit.watchpoint_id)
                        .map(|w| watch_kind_str(w.kind))
                        .unwrap_or("unknown")
                        .to_string();
                    self.broadcaster.publish(Event::new(
                        Some(self.session_id),
                        EventData::WatchpointHit {
                            watchpoint_id: hit.watchpoint_id,
                            addr: hit.addr,
                            kind,
                            old_value: hit.old_value,
                            new_value: hit.new_value,
                        },
                        now_ms(),
                    ));
                }
                ExecState::WaitingForInput => {
                    self.broadcaster.publish(Event::new(Some(self.session_id), EventData::StdinRequest, now_ms()));
                }
                ExecState::Error { fault, pc } => {
                    self.broadcaster.publish(Event::new(
                        Some(self.session_id),
                        EventData::ExecutionError { fault: fault.clone(), pc: *pc },
                        now_ms(),
                    ));
                }
                _ => {}
            }
        }
        self.publish_console_delta();
    }

    fn tick(&self) {
        self.broadcaster.publish(Event::new(
            Some(self.session_id),
            EventData::InstructionRetired { pc: self.controller.registers()[15] },
            now_ms(),
        ));
    }

    fn publish_console_delta(&mut self) {
        let console = self.controller.console();
        if console.len() > self.console_len {
            let text = console[self.console_len..].to_string();
            self.console_len = console.len();
            self.broadcaster.publish(Event::new(
                Some(self.session_id),
                EventData::Console { text },
                now_ms(),
            ));
        }
    }
}

/// A handle to a running session's worker task, owned by the
/// [`SessionManager`]. Cloning the `Arc<Session>` is how the API and the
/// eviction sweep share access without touching the controller itself.
pub struct Session {
    pub id: Uuid,
    tx: mpsc::Sender<SessionRequest>,
    last_touched: Mutex<Instant>,
    pause_requested: Arc<AtomicBool>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session worker is gone")]
    WorkerGone,
}

impl Session {
    async fn send<T>(&self, make: impl FnOnce(Reply<T>) -> SessionRequest) -> Result<T, SessionError> {
        *self.last_touched.lock().await = Instant::now();
        let (tx, rx) = oneshot::channel();
        self.tx.send(make(tx)).await.map_err(|_| SessionError::WorkerGone)?;
        rx.await.map_err(|_| SessionError::WorkerGone)
    }

    pub async fn load_program(&self, source: String) -> Result<Result<LoadOutcome, Vec<arm_asm::Diagnostic>>, SessionError> {
        self.send(|r| SessionRequest::LoadProgram(source, r)).await
    }

    /// Posts the run request and returns as soon as it is accepted; the
    /// worker acks immediately and then drives `continue_run` to
    /// completion, with state transitions arriving as events (§4.10).
    pub async fn run(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::Run).await
    }

    pub async fn step(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::Step).await
    }

    pub async fn step_over(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::StepOver).await
    }

    pub async fn step_out(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::StepOut).await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.send(SessionRequest::Reset).await
    }

    /// Out-of-band: flips the controller's shared pause flag directly
    /// instead of going through the request queue, so it can interrupt a
    /// `run` already in flight (§5, §4.10 "pause ... post a request and ack
    /// immediately").
    pub fn pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub async fn add_breakpoint(&self, addr: u32, condition: Option<String>, temporary: bool) -> Result<u32, SessionError> {
        self.send(|r| SessionRequest::AddBreakpoint { addr, condition, temporary, reply: r }).await
    }

    pub async fn remove_breakpoint(&self, id: u32) -> Result<(), SessionError> {
        self.send(|r| SessionRequest::RemoveBreakpoint(id, r)).await
    }

    pub async fn add_watchpoint(&self, range: (u32, u32), kind: WatchKind) -> Result<u32, SessionError> {
        self.send(|r| SessionRequest::AddWatchpoint { range, kind, reply: r }).await
    }

    pub async fn remove_watchpoint(&self, id: u32) -> Result<(), SessionError> {
        self.send(|r| SessionRequest::RemoveWatchpoint(id, r)).await
    }

    pub async fn evaluate(&self, expr: String) -> Result<Result<u32, EvalError>, SessionError> {
        self.send(|r| SessionRequest::Evaluate(expr, r)).await
    }

    pub async fn send_stdin(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.send(|r| SessionRequest::SendStdin(bytes, r)).await
    }

    pub async fn registers(&self) -> Result<([u32; 16], bool, bool, bool, bool), SessionError> {
        self.send(SessionRequest::GetRegisters).await
    }

    pub async fn memory(&self, addr: u32, len: u32) -> Result<Vec<u8>, SessionError> {
        self.send(|r| SessionRequest::GetMemory(addr, len, r)).await
    }

    pub async fn disassembly(&self, addr: u32, n: usize) -> Result<Vec<(u32, String)>, SessionError> {
        self.send(|r| SessionRequest::GetDisassembly(addr, n, r)).await
    }

    pub async fn stack(&self, words: u32) -> Result<Vec<StackEntry>, SessionError> {
        self.send(|r| SessionRequest::GetStack(words, r)).await
    }

    pub async fn console(&self) -> Result<String, SessionError> {
        self.send(SessionRequest::GetConsole).await
    }

    pub async fn state(&self) -> Result<ExecState, SessionError> {
        self.send(SessionRequest::GetState).await
    }

    pub async fn breakpoints(&self) -> Result<Vec<Breakpoint>, SessionError> {
        self.send(SessionRequest::ListBreakpoints).await
    }

    pub async fn watchpoints(&self) -> Result<Vec<Watchpoint>, SessionError> {
        self.send(SessionRequest::ListWatchpoints).await
    }

    pub async fn traces(&self) -> Result<Traces, SessionError> {
        self.send(SessionRequest::GetTraces).await
    }

    pub async fn history(&self) -> Result<Vec<(String, String)>, SessionError> {
        self.send(SessionRequest::GetHistory).await
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_touched.lock().await.elapsed()
    }
}

/// §4.8 contract: `create_session`, `destroy_session`, `get_session`, and
/// the idle-eviction sweep.
pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    broadcaster: Arc<Broadcaster>,
    config: Arc<DaemonConfig>,
}

impl SessionManager {
    pub fn new(broadcaster: Arc<Broadcaster>, config: Arc<DaemonConfig>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            broadcaster,
            config,
        })
    }

    pub async fn create_session(&self, session_config: SessionConfig) -> Uuid {
        let id = Uuid::new_v4();
        let syscall_config = SyscallConfig {
            fs_root: session_config.fs_root,
            rng_seed: session_config.rng_seed,
            clock_start_ms: 0,
            args: session_config.args,
            env: session_config.env,
            heap_base: 0,
            heap_len: 0x1_0000,
        };
        let controller = DebugController::new(syscall_config);
        let pause_requested = controller.pause_handle();

        let (tx, mut rx) = mpsc::channel::<SessionRequest>(64);
        let mut worker = Worker {
            session_id: id,
            controller,
            broadcaster: self.broadcaster.clone(),
            console_len: 0,
        };
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                worker.handle(request);
            }
        });

        let session = Arc::new(Session {
            id,
            tx,
            last_touched: Mutex::new(Instant::now()),
            pause_requested,
        });
        self.sessions.lock().await.insert(id, session);
        tracing::info!(session_id = %id, "session created");
        id
    }

    /// No-op on an unknown id (§4.10 idempotency).
    pub async fn destroy_session(&self, id: Uuid) {
        if self.sessions.lock().await.remove(&id).is_some() {
            tracing::info!(session_id = %id, "session destroyed");
        }
    }

    pub async fn get_session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<Uuid> {
        self.sessions.lock().await.keys().copied().collect()
    }

    /// Sweeps sessions idle longer than the configured TTL, mirroring the
    /// teacher's background monitor tasks spawned off `QemuSupervisor`
    /// (§2 expansion "Session idle eviction worker").
    pub async fn evict_idle(&self) {
        let ttl = self.config.session_idle_ttl;
        let candidates: Vec<(Uuid, Arc<Session>)> = {
            let sessions = self.sessions.lock().await;
            sessions.iter().map(|(id, s)| (*id, s.clone())).collect()
        };
        for (id, session) in candidates {
            if session.idle_for().await >= ttl {
                self.sessions.lock().await.remove(&id);
                tracing::info!(session_id = %id, "evicted idle session");
            }
        }
    }

    pub fn spawn_eviction_task(self: &Arc<Self>) {
        let manager = self.clone();
        let interval = (self.config.session_idle_ttl / 4).max(Duration::from_secs(5));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.evict_idle().await;
            }
        });
    }
}

pub use Session as SessionHandle;
