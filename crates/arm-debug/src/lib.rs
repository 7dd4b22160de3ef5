//! Debug controller and trace engines (§4.6, §4.7): breakpoints,
//! watchpoints, step/continue/pause, the expression evaluator, and the four
//! trace recorders, layered directly on top of `arm-cpu` and `arm-memory`
//! the way `arm-loader` layers the loader on top of `arm-asm`.

pub mod breakpoint;
pub mod expr;
pub mod history;
pub mod state;
pub mod trace;

pub use breakpoint::{Breakpoint, WatchKind, Watchpoint, WatchpointHit};
pub use expr::{evaluate as evaluate_expr, EvalContext, EvalError};
pub use history::{CommandHistory, HistoryEntry};
pub use state::{ExecState, StateEvent, WatchpointHitRecord};
pub use trace::{Coverage, FlagTrace, MemoryTrace, RegisterTrace, StackTrace};

use arm_asm::SymbolTable;
use arm_cpu::{
    BlockTransfer, Cpsr, Cpu, CpuFault, DataOp, DataProcessing, Instruction, Multiply,
    OffsetOrigin, Operand2, Registers, StepOutcome, LR, PC,
};
use arm_memory::{AccessEvent, AccessKind, MemoryBus, MemoryObserver};
use arm_syscall::console::ConsoleSink;
use arm_syscall::{Syscalls, SyscallConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Upper bound on instructions a single `step_over`/`step_out` may execute
/// before it gives up and reports a runtime fault (§7 "resource exhaustion
/// ... cycle limit ... treated as runtime faults").
const MAX_SCOPED_STEP_INSTRUCTIONS: u64 = 2_000_000;

struct SharedConsole(Arc<Mutex<Vec<u8>>>);

impl ConsoleSink for SharedConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.0.lock().expect("console mutex poisoned").extend_from_slice(bytes);
    }
}

#[derive(Default)]
struct ObserverState {
    log: Vec<AccessEvent>,
    watchpoints: Vec<Watchpoint>,
    next_watchpoint_id: u32,
    last_known: std::collections::HashMap<u32, u32>,
    hit: Option<WatchpointHit>,
}

/// The single `MemoryObserver` a `MemoryBus` supports, fanning every access
/// out to the memory trace and the watchpoint table (§4.6 "Watchpoints are
/// installed as memory-manager trace hooks").
struct DebugObserver(Mutex<ObserverState>);

impl MemoryObserver for DebugObserver {
    fn on_access(&self, event: AccessEvent) {
        let mut state = self.0.lock().expect("observer mutex poisoned");
        state.log.push(event);

        if state.hit.is_none() && matches!(event.kind, AccessKind::Read | AccessKind::Write) {
            let is_write = matches!(event.kind, AccessKind::Write);
            let mut found = None;
            for wp in &state.watchpoints {
                if wp.enabled && wp.kind.matches(is_write) && wp.covers(event.addr, event.size) {
                    found = Some((wp.id, wp.kind));
                    break;
                }
            }
            if let Some((id, kind)) = found {
                // The observer contract only reports the post-access value,
                // so "old" is whatever this hook last saw at the address,
                // defaulting to 0 before any observation.
                let old_value = state.last_known.get(&event.addr).copied().unwrap_or(0);
                state.hit = Some(WatchpointHit {
                    watchpoint_id: id,
                    addr: event.addr,
                    kind,
                    old_value,
                    new_value: event.value,
                });
            }
        }

        match event.kind {
            AccessKind::Write => {
                state.last_known.insert(event.addr, event.value);
            }
            AccessKind::Read => {
                state.last_known.entry(event.addr).or_insert(event.value);
            }
            AccessKind::Execute => {}
        }
    }
}

fn register_by_name(regs: &Registers, name: &str) -> Option<u32> {
    match name {
        "SP" => Some(regs.sp()),
        "LR" => Some(regs.lr()),
        "PC" => Some(regs.visible_pc()),
        _ if name.len() > 1 && name.starts_with('R') => {
            let idx: usize = name[1..].parse().ok()?;
            (idx < 16).then(|| regs.get(idx))
        }
        _ => None,
    }
}

fn flag_by_name(cpsr: Cpsr, name: &str) -> Option<bool> {
    match name {
        "N" => Some(cpsr.n),
        "Z" => Some(cpsr.z),
        "C" => Some(cpsr.c),
        "V" => Some(cpsr.v),
        _ => None,
    }
}

fn peek_word(mem: &MemoryBus, addr: u32) -> Option<u32> {
    let seg = mem.segment_for(addr)?;
    if !seg.contains_range(addr, 4) {
        return None;
    }
    let bytes = seg.read_slice(addr, 4);
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn peek_byte(mem: &MemoryBus, addr: u32) -> Option<u8> {
    let seg = mem.segment_for(addr)?;
    Some(seg.read_slice(addr, 1)[0])
}

/// Which registers a decoded instruction reads and writes, used to drive
/// the register trace engine (§4.7) — `arm-cpu` has no hook of its own for
/// this, so the controller re-derives it from the decoded instruction.
fn register_accesses(kind: &Instruction) -> (Vec<usize>, Vec<usize>) {
    let mut reads = Vec::new();
    let mut writes = Vec::new();
    match *kind {
        Instruction::DataProcessing(DataProcessing { op, rn, rd, operand2, .. }) => {
            if op.uses_rn() {
                reads.push(rn);
            }
            match operand2 {
                Operand2::ShiftByImmediate { rm, .. } => reads.push(rm),
                Operand2::ShiftByRegister { rm, rs, .. } => {
                    reads.push(rm);
                    reads.push(rs);
                }
                Operand2::RotatedImmediate { .. } => {}
            }
            if !op.is_comparison() {
                writes.push(rd);
            }
        }
        Instruction::Multiply(Multiply { accumulate, rd, rn, rs, rm, .. }) => {
            reads.push(rm);
            reads.push(rs);
            if accumulate {
                reads.push(rn);
            }
            writes.push(rd);
        }
        Instruction::SingleTransfer(st) => {
            reads.push(st.rn);
            if let OffsetOrigin::Register { rm, .. } = st.offset {
                reads.push(rm);
            }
            if st.load {
                writes.push(st.rd);
            } else {
                reads.push(st.rd);
            }
            if !matches!(st.index_mode, arm_cpu::IndexMode::Offset) {
                writes.push(st.rn);
            }
        }
        Instruction::BlockTransfer(BlockTransfer { load, writeback, rn, register_list, .. }) => {
            reads.push(rn);
            for r in 0..16u32 {
                if register_list & (1 << r) != 0 {
                    if load {
                        writes.push(r as usize);
                    } else {
                        reads.push(r as usize);
                    }
                }
            }
            if writeback {
                writes.push(rn);
            }
        }
        Instruction::Branch { link, .. } => {
            reads.push(PC);
            writes.push(PC);
            if link {
                writes.push(LR);
            }
        }
        Instruction::Swi { .. } => {}
    }
    (reads, writes)
}

/// Heuristic subroutine-return recognizer used to track call depth for
/// `step_over`/`step_out` (§4.6): a `MOV PC, LR` or an `LDM{...}` epilogue
/// that loads PC. ARMv2 has no `BX`, so these are the two idiomatic forms.
fn is_return_pattern(kind: &Instruction) -> bool {
    match *kind {
        Instruction::DataProcessing(DataProcessing {
            op: DataOp::Mov,
            rd,
            operand2: Operand2::ShiftByImmediate { rm, amount: 0, .. },
            ..
        }) => rd == PC && rm == LR,
        Instruction::BlockTransfer(BlockTransfer { load: true, register_list, .. }) => {
            register_list & (1 << PC) != 0
        }
        _ => false,
    }
}

struct ControllerEvalCtx<'a> {
    regs: &'a Registers,
    cpsr: Cpsr,
    mem: &'a MemoryBus,
    symbols: Option<&'a SymbolTable>,
}

impl<'a> EvalContext for ControllerEvalCtx<'a> {
    fn register(&self, name: &str) -> Option<u32> {
        register_by_name(self.regs, name)
    }
    fn flag(&self, name: &str) -> Option<bool> {
        flag_by_name(self.cpsr, name)
    }
    fn symbol(&self, name: &str) -> Option<u32> {
        self.symbols.and_then(|s| s.resolve(name))
    }
    fn read_word(&self, addr: u32) -> Option<u32> {
        peek_word(self.mem, addr)
    }
}

/// The debug controller: a loaded session's CPU, memory, and syscalls, plus
/// every debugging overlay described in §4.6/§4.7. `arm-debug` owns the
/// whole session in-process; `armd` wraps one of these per emulator session
/// with its own worker thread and request queue (§4.8).
pub struct DebugController {
    mem: MemoryBus,
    syscalls: Syscalls,
    regs: Registers,
    cpsr: Cpsr,
    halted: bool,
    observer: Arc<DebugObserver>,
    console: Arc<Mutex<Vec<u8>>>,
    state: ExecState,
    pause_requested: Arc<AtomicBool>,
    breakpoints: Vec<Breakpoint>,
    next_breakpoint_id: u32,
    program: Option<arm_asm::AssembledProgram>,
    entry_point: u32,
    stack_top: u32,
    code_base: u32,
    code_len: u32,
    call_depth: i32,
    memory_trace: MemoryTrace,
    flag_trace: FlagTrace,
    stack_trace: StackTrace,
    register_trace: RegisterTrace,
    coverage: Coverage,
    history: CommandHistory,
}

impl DebugController {
    pub fn new(config: SyscallConfig) -> Self {
        let console = Arc::new(Mutex::new(Vec::new()));
        let syscalls = Syscalls::new(config, Box::new(SharedConsole(console.clone())));
        let observer = Arc::new(DebugObserver(Mutex::new(ObserverState::default())));
        let mut mem = MemoryBus::new();
        mem.set_observer(observer.clone() as Arc<dyn MemoryObserver>);
        let code_base = arm_loader::MemoryMapConfig::default().code_base;
        Self {
            mem,
            syscalls,
            regs: Registers::default(),
            cpsr: Cpsr::default(),
            halted: false,
            observer,
            console,
            state: ExecState::Idle,
            pause_requested: Arc::new(AtomicBool::new(false)),
            breakpoints: Vec::new(),
            next_breakpoint_id: 1,
            program: None,
            entry_point: code_base,
            stack_top: 0,
            code_base,
            code_len: arm_loader::DEFAULT_CODE_LEN,
            call_depth: 0,
            memory_trace: MemoryTrace::default(),
            flag_trace: FlagTrace::default(),
            stack_trace: StackTrace::new(0, 0),
            register_trace: RegisterTrace::default(),
            coverage: Coverage::new(code_base, arm_loader::DEFAULT_CODE_LEN),
            history: CommandHistory::new(256),
        }
    }

    /// A cloneable handle a driving thread can use to request a pause
    /// without holding a lock on the controller itself (§5 "a pause flag is
    /// checked at every instruction boundary").
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        self.pause_requested.clone()
    }

    pub fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> &ExecState {
        &self.state
    }

    pub fn registers(&self) -> [u32; 16] {
        *self.regs.all()
    }

    pub fn cpsr(&self) -> Cpsr {
        self.cpsr
    }

    pub fn console(&self) -> String {
        String::from_utf8_lossy(&self.console.lock().expect("console mutex poisoned")).into_owned()
    }

    pub fn send_stdin(&mut self, data: &[u8]) {
        self.syscalls.stdin_mut().push_bytes(data);
        if matches!(self.state, ExecState::WaitingForInput) {
            self.continue_run();
        }
    }

    pub fn read_memory(&self, addr: u32, len: u32) -> Vec<u8> {
        (0..len).map(|i| peek_byte(&self.mem, addr.wrapping_add(i)).unwrap_or(0)).collect()
    }

    pub fn disassembly(&self, addr: u32, n: usize) -> Vec<(u32, String)> {
        let mut out = Vec::with_capacity(n);
        let mut a = addr;
        for _ in 0..n {
            let Some(word) = peek_word(&self.mem, a) else { break };
            out.push((a, arm_asm::disasm::disassemble_word(a, word)));
            a = a.wrapping_add(4);
        }
        out
    }

    pub fn stack_snapshot(&self, words: u32) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        let mut addr = self.regs.sp();
        for _ in 0..words {
            if addr >= self.stack_top {
                break;
            }
            if let Some(v) = peek_word(&self.mem, addr) {
                out.push((addr, v));
            }
            addr = addr.wrapping_add(4);
        }
        out
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn memory_trace(&self) -> &MemoryTrace {
        &self.memory_trace
    }
    pub fn flag_trace(&self) -> &FlagTrace {
        &self.flag_trace
    }
    pub fn stack_trace(&self) -> &StackTrace {
        &self.stack_trace
    }
    pub fn register_trace(&self) -> &RegisterTrace {
        &self.register_trace
    }
    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// `address → (source line, column)` for the currently loaded program,
    /// returned by `load_program` alongside diagnostics (§4.10 "returns
    /// diagnostics and source-map").
    pub fn source_map(&self) -> &[arm_asm::SourceMapEntry] {
        self.program.as_ref().map(|p| p.source_map.as_slice()).unwrap_or(&[])
    }

    pub fn symbols(&self) -> Option<&arm_asm::SymbolTable> {
        self.program.as_ref().map(|p| &p.symbols)
    }

    pub fn entry_point(&self) -> u32 {
        self.entry_point
    }

    fn eval_ctx(&self) -> ControllerEvalCtx<'_> {
        ControllerEvalCtx {
            regs: &self.regs,
            cpsr: self.cpsr,
            mem: &self.mem,
            symbols: self.program.as_ref().map(|p| &p.symbols),
        }
    }

    pub fn evaluate(&mut self, expression: &str) -> Result<u32, EvalError> {
        let result = expr::evaluate(expression, &self.eval_ctx());
        self.history.push(format!("evaluate {expression}"), match &result {
            Ok(v) => format!("{v:#010x}"),
            Err(e) => e.to_string(),
        });
        result
    }

    /// Assemble and load `source`, replacing any previously loaded program
    /// (§4.10 "parse+encode+load; returns diagnostics and source-map").
    pub fn load_program(&mut self, source: &str) -> Result<Vec<arm_asm::Diagnostic>, Vec<arm_asm::Diagnostic>> {
        let (program, diagnostics) = arm_asm::assemble(source)?;
        let config = arm_loader::MemoryMapConfig::default();

        let mut mem = MemoryBus::new();
        mem.set_observer(self.observer.clone() as Arc<dyn MemoryObserver>);
        let image = arm_loader::load(&mut mem, &program, &config)
            .map_err(|e| vec![arm_asm::Diagnostic::error(0, e.to_string())])?;

        self.mem = mem;
        self.code_base = config.code_base;
        self.code_len = config.code_len;
        self.entry_point = image.entry_point;
        self.stack_top = image.stack_top;
        self.coverage = Coverage::new(self.code_base, self.code_len);
        self.stack_trace = StackTrace::new(config.stack_base, config.stack_len);
        self.program = Some(program);
        self.reset_to_entry();
        self.history.push("load_program", "ok");
        Ok(diagnostics)
    }

    /// `(reset) → idle`: re-seed the register file and halt flag, but leave
    /// breakpoints, watchpoints, and accumulated traces in place.
    pub fn reset_to_entry(&mut self) {
        let mut cpu = Cpu::new(&mut self.mem, &mut self.syscalls);
        cpu.reset(self.entry_point, self.stack_top);
        self.regs = cpu.regs;
        self.cpsr = cpu.cpsr;
        self.halted = cpu.halted;
        self.call_depth = 0;
        self.transition(ExecState::Idle);
        self.history.push("reset", "idle");
    }

    fn with_cpu<R>(&mut self, f: impl FnOnce(&mut Cpu) -> R) -> R {
        let mut cpu = Cpu::new(&mut self.mem, &mut self.syscalls);
        cpu.regs = self.regs;
        cpu.cpsr = self.cpsr;
        cpu.halted = self.halted;
        let result = f(&mut cpu);
        self.regs = cpu.regs;
        self.cpsr = cpu.cpsr;
        self.halted = cpu.halted;
        result
    }

    fn transition(&mut self, to: ExecState) {
        self.state = to;
    }

    fn drain_memory_log(&mut self) {
        let events: Vec<AccessEvent> = {
            let mut state = self.observer.0.lock().expect("observer mutex poisoned");
            state.log.drain(..).collect()
        };
        for event in events {
            self.memory_trace.record(event.pc, event.addr, event.size, event.kind, event.value);
        }
    }

    fn drain_watchpoint_hit(&mut self) -> Option<WatchpointHit> {
        self.observer.0.lock().expect("observer mutex poisoned").hit.take()
    }

    fn condition_holds(&self, condition: &Option<String>) -> bool {
        match condition {
            None => true,
            Some(expr) => expr::evaluate(expr, &self.eval_ctx()).map(|v| v != 0).unwrap_or(false),
        }
    }

    /// `Some(id)` if an enabled breakpoint sits at `pc` and its condition
    /// (if any) holds; a failed condition evaluation never fires (§4.6).
    fn breakpoint_at(&self, pc: u32) -> Option<u32> {
        self.breakpoints
            .iter()
            .find(|b| b.enabled && b.addr == pc && self.condition_holds(&b.condition))
            .map(|b| b.id)
    }

    fn fire_breakpoint(&mut self, id: u32) {
        let pc = self.regs.pc();
        if let Some(bp) = self.breakpoints.iter_mut().find(|b| b.id == id) {
            bp.hit_count += 1;
        }
        let temporary = self.breakpoints.iter().any(|b| b.id == id && b.temporary);
        if temporary {
            self.breakpoints.retain(|b| b.id != id);
        }
        self.transition(ExecState::PausedAtBreakpoint { breakpoint_id: id, pc });
    }

    /// Execute exactly one instruction and perform all trace bookkeeping.
    /// Does not consult breakpoints — callers check those first.
    fn execute_one(&mut self) -> Result<StepOutcome, CpuFault> {
        let pc_before = self.regs.pc();
        let word = self.mem.fetch_word(pc_before).ok();
        let cpsr_before = self.cpsr;

        self.syscalls.tick();
        let outcome = self.with_cpu(|cpu| cpu.step())?;

        self.coverage.record(pc_before);

        if let Some(word) = word {
            if let Ok(decoded) = arm_cpu::decode(word) {
                if decoded.cond.is_satisfied(cpsr_before) {
                    let (reads, writes) = register_accesses(&decoded.kind);
                    for r in reads {
                        self.register_trace.record_read(r);
                    }
                    for w in writes {
                        self.register_trace.record_write(w);
                    }
                    if let Instruction::Branch { link: true, .. } = decoded.kind {
                        self.call_depth += 1;
                    } else if is_return_pattern(&decoded.kind) {
                        self.call_depth = (self.call_depth - 1).max(0);
                    }
                }
            }
        }

        self.flag_trace.record(pc_before, cpsr_before, self.cpsr);
        self.stack_trace.record(pc_before, self.regs.sp(), self.call_depth);
        self.drain_memory_log();

        Ok(outcome)
    }

    fn apply_step_outcome(&mut self, outcome: Result<StepOutcome, CpuFault>) {
        match outcome {
            Ok(StepOutcome::Continued) => {
                if let Some(hit) = self.drain_watchpoint_hit() {
                    self.transition(ExecState::PausedAtWatchpoint { hit: hit.into() });
                } else {
                    self.transition(ExecState::Paused { pc: self.regs.pc() });
                }
            }
            Ok(StepOutcome::Halted { exit_code }) => self.transition(ExecState::Halted { exit_code }),
            Ok(StepOutcome::WaitingForInput) => self.transition(ExecState::WaitingForInput),
            Ok(StepOutcome::DebugBreak) => self.transition(ExecState::Paused { pc: self.regs.pc() }),
            Err(fault) => {
                let pc = self.regs.pc();
                self.transition(ExecState::from_fault(&fault, pc));
            }
        }
    }

    /// `step()`: execute exactly one instruction then pause (§4.6).
    pub fn step(&mut self) -> &ExecState {
        self.transition(ExecState::Running);
        let outcome = self.execute_one();
        self.apply_step_outcome(outcome);
        self.history.push("step", format!("{:?}", self.state));
        &self.state
    }

    /// `step_over()`: run until the next instruction strictly past the
    /// starting PC at the same call depth, so a `BL` is stepped through
    /// rather than into (§4.6).
    pub fn step_over(&mut self) -> &ExecState {
        let start_pc = self.regs.pc();
        let start_depth = self.call_depth;
        self.transition(ExecState::Running);

        for _ in 0..MAX_SCOPED_STEP_INSTRUCTIONS {
            if let Some(id) = self.breakpoint_at(self.regs.pc()) {
                if self.regs.pc() != start_pc {
                    self.fire_breakpoint(id);
                    self.history.push("step_over", format!("{:?}", self.state));
                    return &self.state;
                }
            }
            let outcome = self.execute_one();
            match &outcome {
                Ok(StepOutcome::Continued) => {
                    if let Some(hit) = self.drain_watchpoint_hit() {
                        self.transition(ExecState::PausedAtWatchpoint { hit: hit.into() });
                        self.history.push("step_over", format!("{:?}", self.state));
                        return &self.state;
                    }
                    if self.regs.pc() > start_pc && self.call_depth == start_depth {
                        self.transition(ExecState::Paused { pc: self.regs.pc() });
                        self.history.push("step_over", format!("{:?}", self.state));
                        return &self.state;
                    }
                }
                _ => {
                    self.apply_step_outcome(outcome);
                    self.history.push("step_over", format!("{:?}", self.state));
                    return &self.state;
                }
            }
        }
        self.transition(ExecState::Error { fault: "step_over exceeded instruction budget".into(), pc: self.regs.pc() });
        self.history.push("step_over", format!("{:?}", self.state));
        &self.state
    }

    /// `step_out()`: set a temporary breakpoint at the current return
    /// address (LR) and continue (§4.6 "more simply by setting a temporary
    /// breakpoint at the current LR").
    pub fn step_out(&mut self) -> &ExecState {
        let lr = self.regs.lr();
        let id = self.next_breakpoint_id;
        self.next_breakpoint_id += 1;
        self.breakpoints.push(Breakpoint { id, addr: lr, enabled: true, condition: None, hit_count: 0, temporary: true });
        let result = self.continue_run();
        let _ = result;
        self.history.push("step_out", format!("{:?}", self.state));
        &self.state
    }

    /// `continue()`: run until a breakpoint, watchpoint, fault, halt, stdin
    /// wait, or external pause (§4.6).
    pub fn continue_run(&mut self) -> &ExecState {
        // Resuming from a breakpoint already sitting at the current PC must
        // not instantly re-fire it — step past it once before re-arming the
        // check, or `continue` after a breakpoint hit could never progress.
        let start_pc = self.regs.pc();
        let resuming_at_breakpoint =
            matches!(self.state, ExecState::PausedAtBreakpoint { pc, .. } if pc == start_pc);
        let mut skip_check = resuming_at_breakpoint;

        self.pause_requested.store(false, Ordering::SeqCst);
        self.transition(ExecState::Running);

        loop {
            if self.pause_requested.swap(false, Ordering::SeqCst) {
                self.transition(ExecState::Paused { pc: self.regs.pc() });
                break;
            }
            if skip_check {
                skip_check = false;
            } else if let Some(id) = self.breakpoint_at(self.regs.pc()) {
                self.fire_breakpoint(id);
                break;
            }
            let outcome = self.execute_one();
            match &outcome {
                Ok(StepOutcome::Continued) => {
                    if let Some(hit) = self.drain_watchpoint_hit() {
                        self.transition(ExecState::PausedAtWatchpoint { hit: hit.into() });
                        break;
                    }
                }
                _ => {
                    self.apply_step_outcome(outcome);
                    break;
                }
            }
        }
        self.history.push("continue", format!("{:?}", self.state));
        &self.state
    }

    pub fn pause(&mut self) -> &ExecState {
        self.transition(ExecState::Paused { pc: self.regs.pc() });
        &self.state
    }

    /// Idempotent per §4.10: re-adding at an address that already carries a
    /// breakpoint returns the existing id rather than creating a duplicate.
    pub fn add_breakpoint(&mut self, addr: u32, condition: Option<String>, temporary: bool) -> u32 {
        if let Some(existing) = self.breakpoints.iter().find(|b| b.addr == addr) {
            return existing.id;
        }
        let id = self.next_breakpoint_id;
        self.next_breakpoint_id += 1;
        self.breakpoints.push(Breakpoint { id, addr, enabled: true, condition, hit_count: 0, temporary });
        self.history.push(format!("add_breakpoint {addr:#010x}"), id.to_string());
        id
    }

    pub fn remove_breakpoint(&mut self, id: u32) {
        self.breakpoints.retain(|b| b.id != id);
        self.history.push(format!("remove_breakpoint {id}"), "ok");
    }

    pub fn enable_breakpoint(&mut self, id: u32, enabled: bool) {
        if let Some(bp) = self.breakpoints.iter_mut().find(|b| b.id == id) {
            bp.enabled = enabled;
        }
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn add_watchpoint(&mut self, addr_range: (u32, u32), kind: WatchKind) -> u32 {
        let mut state = self.observer.0.lock().expect("observer mutex poisoned");
        let id = state.next_watchpoint_id;
        state.next_watchpoint_id += 1;
        state.watchpoints.push(Watchpoint { id, addr_range, kind, enabled: true });
        self.history.push(format!("add_watchpoint {addr_range:?}"), id.to_string());
        id
    }

    pub fn remove_watchpoint(&mut self, id: u32) {
        let mut state = self.observer.0.lock().expect("observer mutex poisoned");
        state.watchpoints.retain(|w| w.id != id);
        self.history.push(format!("remove_watchpoint {id}"), "ok");
    }

    pub fn watchpoints(&self) -> Vec<Watchpoint> {
        self.observer.0.lock().expect("observer mutex poisoned").watchpoints.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyscallConfig {
        SyscallConfig {
            fs_root: std::env::temp_dir(),
            rng_seed: 1,
            clock_start_ms: 0,
            args: vec![],
            env: vec![],
            heap_base: 0x2_0000,
            heap_len: 0x1000,
        }
    }

    #[test]
    fn step_executes_one_instruction_and_pauses() {
        let mut dbg = DebugController::new(config());
        dbg.load_program("MOV R0, #5\nMOV R1, #7\nSWI #0\n").unwrap();
        dbg.step();
        assert_eq!(dbg.registers()[0], 5);
        assert!(matches!(dbg.state(), ExecState::Paused { .. }));
    }

    #[test]
    fn breakpoint_restart_reaches_the_recorded_pc() {
        let mut dbg = DebugController::new(config());
        dbg.load_program(
            "_start:\n\
                MOV R0, #1\n\
                MOV R0, #2\n\
                MOV R0, #3\n\
                MOV R0, #4\n\
                SWI #0\n",
        )
        .unwrap();
        dbg.step();
        dbg.step();
        dbg.step();
        let recorded_pc = dbg.registers()[15];
        dbg.add_breakpoint(recorded_pc, None, false);
        dbg.reset_to_entry();
        dbg.continue_run();
        assert_eq!(dbg.registers()[15], recorded_pc);
        assert!(matches!(dbg.state(), ExecState::PausedAtBreakpoint { pc, .. } if *pc == recorded_pc));
    }

    #[test]
    fn watchpoint_fires_on_write() {
        let mut dbg = DebugController::new(config());
        dbg.load_program(
            "_start:\n\
                MOV R0, #0x42\n\
                LDR R1, =0x20000\n\
                STR R0, [R1]\n\
                SWI #0\n",
        )
        .unwrap();
        dbg.add_watchpoint((0x2_0000, 0x2_0004), WatchKind::Write);
        dbg.continue_run();
        assert!(matches!(dbg.state(), ExecState::PausedAtWatchpoint { .. }));
    }

    #[test]
    fn evaluate_reads_registers_and_memory() {
        let mut dbg = DebugController::new(config());
        dbg.load_program("MOV R0, #9\nSWI #0\n").unwrap();
        dbg.step();
        assert_eq!(dbg.evaluate("R0 + 1").unwrap(), 10);
    }

    #[test]
    fn step_over_skips_a_called_subroutine() {
        let mut dbg = DebugController::new(config());
        dbg.load_program(
            "_start:\n\
                BL sub\n\
                MOV R2, #1\n\
                SWI #0\n\
            sub:\n\
                MOV R1, #9\n\
                MOV PC, LR\n",
        )
        .unwrap();
        dbg.step_over();
        assert_eq!(dbg.registers()[1], 9);
        assert_eq!(dbg.registers()[2], 0);
    }

    #[test]
    fn failing_condition_does_not_fire_breakpoint() {
        let mut dbg = DebugController::new(config());
        dbg.load_program("_start:\n    MOV R0, #1\n    SWI #0\n").unwrap();
        dbg.add_breakpoint(0x8000, Some("UNDEFINED_SYMBOL".to_string()), false);
        dbg.continue_run();
        assert!(matches!(dbg.state(), ExecState::Halted { .. }));
    }
}
