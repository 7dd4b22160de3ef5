//! Hosted-program syscall surface (§4.3): console I/O, file I/O confined to
//! a sandbox root, time/random, and debug aids, dispatched by SWI number.

pub mod console;
pub mod fs_sandbox;
pub mod heap;
pub mod stdin;

pub use console::{BufferConsole, ConsoleSink};
pub use stdin::StdinQueue;

use arm_cpu::{CpuFault, Registers, SyscallHandler, SyscallOutcome};
use arm_memory::MemoryBus;
use heap::BumpHeap;
use rand::{RngCore, SeedableRng};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// SWI numbers, named per the table in §4.3.
pub mod numbers {
    pub const EXIT: u32 = 0x00;
    pub const WRITE_CHAR: u32 = 0x01;
    pub const WRITE_STRING: u32 = 0x02;
    pub const WRITE_INT: u32 = 0x03;
    pub const READ_CHAR: u32 = 0x04;
    pub const READ_STRING: u32 = 0x05;
    pub const READ_INT: u32 = 0x06;
    pub const WRITE_NEWLINE: u32 = 0x07;
    pub const OPEN: u32 = 0x10;
    pub const CLOSE: u32 = 0x11;
    pub const READ: u32 = 0x12;
    pub const WRITE: u32 = 0x13;
    pub const SEEK: u32 = 0x14;
    pub const ALLOCATE: u32 = 0x20;
    pub const FREE: u32 = 0x21;
    pub const GET_TIME: u32 = 0x30;
    pub const GET_RANDOM: u32 = 0x31;
    pub const GET_ARGUMENTS: u32 = 0x32;
    pub const GET_ENVIRONMENT: u32 = 0x33;
    pub const DEBUG_PRINT: u32 = 0xF0;
    pub const BREAKPOINT: u32 = 0xF1;
    pub const DUMP_REGISTERS: u32 = 0xF2;
    pub const DUMP_MEMORY: u32 = 0xF3;
    pub const ASSERT: u32 = 0xF4;
}

/// Construction-time configuration; deterministic and seedable so that
/// `reset_to_entry` followed by the same input sequence reproduces the same
/// final state (§8 "Round-trip and idempotence").
pub struct SyscallConfig {
    pub fs_root: PathBuf,
    pub rng_seed: u64,
    pub clock_start_ms: u64,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub heap_base: u32,
    pub heap_len: u32,
}

/// Everything the syscall layer needs that isn't the CPU register file or
/// memory bus, which arrive as arguments to `handle`.
pub struct Syscalls {
    console: Box<dyn ConsoleSink>,
    stdin: StdinQueue,
    fs_root: PathBuf,
    files: HashMap<u32, File>,
    next_fd: u32,
    heap: BumpHeap,
    rng: rand::rngs::StdRng,
    tick: u64,
    args: Vec<String>,
    env: Vec<(String, String)>,
    argv_ptr: Option<u32>,
    envp_ptr: Option<u32>,
}

impl Syscalls {
    pub fn new(config: SyscallConfig, console: Box<dyn ConsoleSink>) -> Self {
        Self {
            console,
            stdin: StdinQueue::new(),
            fs_root: config.fs_root,
            files: HashMap::new(),
            next_fd: 3, // 0/1/2 reserved for stdin/stdout/stderr, unused here
            heap: BumpHeap::new(config.heap_base, config.heap_len),
            rng: rand::rngs::StdRng::seed_from_u64(config.rng_seed),
            tick: config.clock_start_ms,
            args: config.args,
            env: config.env,
            argv_ptr: None,
            envp_ptr: None,
        }
    }

    pub fn stdin_mut(&mut self) -> &mut StdinQueue {
        &mut self.stdin
    }

    pub fn console_mut(&mut self) -> &mut dyn ConsoleSink {
        self.console.as_mut()
    }

    /// Advance the monotonic clock; called once per `step()` by the owning
    /// session so `GET_TIME` is deterministic under replay.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    fn write_cstr(&mut self, mem: &MemoryBus, ptr: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut addr = ptr;
        loop {
            let Ok(b) = mem.read_byte(addr, addr) else { break };
            if b == 0 {
                break;
            }
            bytes.push(b);
            addr = addr.wrapping_add(1);
        }
        bytes
    }

    fn materialize_vectors(&mut self, mem: &mut MemoryBus) {
        if self.argv_ptr.is_some() {
            return;
        }
        let args = self.args.clone();
        let env = self.env.clone();
        let mut string_ptrs = Vec::with_capacity(args.len());
        for arg in &args {
            let bytes = arg.as_bytes();
            if let Some(ptr) = self.heap.allocate(bytes.len() as u32 + 1) {
                let _ = mem.load_bytes(ptr, bytes);
                let _ = mem.load_bytes(ptr + bytes.len() as u32, &[0]);
                string_ptrs.push(ptr);
            }
        }
        let argv_array_len = (string_ptrs.len() as u32 + 1) * 4;
        if let Some(array_ptr) = self.heap.allocate(argv_array_len) {
            for (i, ptr) in string_ptrs.iter().enumerate() {
                let _ = mem.write_word(array_ptr + i as u32 * 4, *ptr, array_ptr);
            }
            let _ = mem.write_word(array_ptr + string_ptrs.len() as u32 * 4, 0, array_ptr);
            self.argv_ptr = Some(array_ptr);
        }

        let mut env_ptrs = Vec::with_capacity(env.len());
        for (key, value) in &env {
            let line = format!("{key}={value}");
            let bytes = line.as_bytes();
            if let Some(ptr) = self.heap.allocate(bytes.len() as u32 + 1) {
                let _ = mem.load_bytes(ptr, bytes);
                let _ = mem.load_bytes(ptr + bytes.len() as u32, &[0]);
                env_ptrs.push(ptr);
            }
        }
        let envp_array_len = (env_ptrs.len() as u32 + 1) * 4;
        if let Some(array_ptr) = self.heap.allocate(envp_array_len) {
            for (i, ptr) in env_ptrs.iter().enumerate() {
                let _ = mem.write_word(array_ptr + i as u32 * 4, *ptr, array_ptr);
            }
            let _ = mem.write_word(array_ptr + env_ptrs.len() as u32 * 4, 0, array_ptr);
            self.envp_ptr = Some(array_ptr);
        }
    }

    fn write_console(&mut self, bytes: &[u8]) {
        self.console.write_bytes(bytes);
    }

    fn resolved_path(&self, requested: &str) -> Result<PathBuf, fs_sandbox::SandboxEscape> {
        fs_sandbox::resolve(&self.fs_root, requested)
    }

    fn file_io(&mut self, number: u32, pc: u32, regs: &mut Registers, mem: &mut MemoryBus) -> Result<SyscallOutcome, CpuFault> {
        match number {
            numbers::OPEN => {
                let path_bytes = self.write_cstr(mem, regs.get(0));
                let path_str = String::from_utf8_lossy(&path_bytes).into_owned();
                let resolved = self
                    .resolved_path(&path_str)
                    .map_err(|_| CpuFault::SecurityFault { pc })?;
                let mode = regs.get(1);
                let mut options = std::fs::OpenOptions::new();
                match mode {
                    0 => { options.read(true); }
                    1 => { options.write(true).create(true).truncate(true); }
                    2 => { options.append(true).create(true); }
                    _ => { options.read(true).write(true).create(true); }
                }
                match options.open(&resolved) {
                    Ok(file) => {
                        let fd = self.next_fd;
                        self.next_fd += 1;
                        self.files.insert(fd, file);
                        regs.set(0, fd);
                    }
                    Err(_) => regs.set(0, u32::MAX),
                }
            }
            numbers::CLOSE => {
                let fd = regs.get(0);
                self.files.remove(&fd);
                regs.set(0, 0);
            }
            numbers::READ => {
                let fd = regs.get(0);
                let buf_ptr = regs.get(1);
                let len = regs.get(2);
                let mut tmp = vec![0u8; len as usize];
                let read = self
                    .files
                    .get_mut(&fd)
                    .and_then(|f| f.read(&mut tmp).ok())
                    .unwrap_or(0);
                let _ = mem.load_bytes(buf_ptr, &tmp[..read]);
                regs.set(0, read as u32);
            }
            numbers::WRITE => {
                let fd = regs.get(0);
                let buf_ptr = regs.get(1);
                let len = regs.get(2);
                let mut tmp = Vec::with_capacity(len as usize);
                for i in 0..len {
                    tmp.push(mem.read_byte(buf_ptr + i, pc).unwrap_or(0));
                }
                let written = self
                    .files
                    .get_mut(&fd)
                    .and_then(|f| f.write(&tmp).ok())
                    .unwrap_or(0);
                regs.set(0, written as u32);
            }
            numbers::SEEK => {
                let fd = regs.get(0);
                let offset = regs.get(1) as i32 as i64;
                let whence = regs.get(2);
                let seek_from = match whence {
                    1 => SeekFrom::Current(offset),
                    2 => SeekFrom::End(offset),
                    _ => SeekFrom::Start(offset.max(0) as u64),
                };
                let pos = self
                    .files
                    .get_mut(&fd)
                    .and_then(|f| f.seek(seek_from).ok())
                    .unwrap_or(u64::MAX);
                regs.set(0, pos as u32);
            }
            _ => unreachable!("file_io dispatched for non-file syscall"),
        }
        Ok(SyscallOutcome::Continue)
    }
}

impl SyscallHandler for Syscalls {
    fn handle(
        &mut self,
        number: u32,
        pc: u32,
        regs: &mut Registers,
        mem: &mut MemoryBus,
    ) -> Result<SyscallOutcome, CpuFault> {
        use numbers::*;
        match number {
            EXIT => Ok(SyscallOutcome::Halt {
                exit_code: regs.get(0) as i32,
            }),
            WRITE_CHAR => {
                self.write_console(&[regs.get(0) as u8]);
                Ok(SyscallOutcome::Continue)
            }
            WRITE_STRING => {
                let bytes = self.write_cstr(mem, regs.get(0));
                self.write_console(&bytes);
                Ok(SyscallOutcome::Continue)
            }
            WRITE_INT => {
                let value = regs.get(0) as i32;
                let base = regs.get(1);
                let formatted = match base {
                    2 => format!("{:b}", value),
                    16 => format!("{:x}", value),
                    _ => format!("{}", value),
                };
                self.write_console(formatted.as_bytes());
                Ok(SyscallOutcome::Continue)
            }
            WRITE_NEWLINE => {
                self.write_console(b"\n");
                Ok(SyscallOutcome::Continue)
            }
            READ_CHAR => match self.stdin.pop_byte() {
                Some(b) => {
                    regs.set(0, b as u32);
                    Ok(SyscallOutcome::Continue)
                }
                None => Ok(SyscallOutcome::WaitForInput),
            },
            READ_STRING => {
                if !self.stdin.peek_line_ready() {
                    return Ok(SyscallOutcome::WaitForInput);
                }
                let buf_ptr = regs.get(0);
                let max = regs.get(1);
                let mut line = self.stdin.pop_line().unwrap_or_default();
                line.truncate(max.saturating_sub(1) as usize);
                line.push(0);
                let _ = mem.load_bytes(buf_ptr, &line);
                regs.set(0, (line.len() - 1) as u32);
                Ok(SyscallOutcome::Continue)
            }
            READ_INT => {
                if !self.stdin.peek_line_ready() {
                    return Ok(SyscallOutcome::WaitForInput);
                }
                let base = regs.get(1).max(2);
                let line = self.stdin.pop_line().unwrap_or_default();
                let text = String::from_utf8_lossy(&line);
                let value = i32::from_str_radix(text.trim(), base as u32).unwrap_or(0);
                regs.set(0, value as u32);
                Ok(SyscallOutcome::Continue)
            }
            OPEN | CLOSE | READ | WRITE | SEEK => self.file_io(number, pc, regs, mem),
            ALLOCATE => {
                let size = regs.get(0);
                match self.heap.allocate(size) {
                    Some(ptr) => regs.set(0, ptr),
                    None => regs.set(0, 0),
                }
                Ok(SyscallOutcome::Continue)
            }
            FREE => {
                self.heap.free(regs.get(0));
                Ok(SyscallOutcome::Continue)
            }
            GET_TIME => {
                regs.set(0, self.tick as u32);
                Ok(SyscallOutcome::Continue)
            }
            GET_RANDOM => {
                regs.set(0, self.rng.next_u32());
                Ok(SyscallOutcome::Continue)
            }
            GET_ARGUMENTS => {
                self.materialize_vectors(mem);
                regs.set(0, self.args.len() as u32);
                regs.set(1, self.argv_ptr.unwrap_or(0));
                Ok(SyscallOutcome::Continue)
            }
            GET_ENVIRONMENT => {
                self.materialize_vectors(mem);
                regs.set(0, self.envp_ptr.unwrap_or(0));
                Ok(SyscallOutcome::Continue)
            }
            DEBUG_PRINT => {
                let bytes = self.write_cstr(mem, regs.get(0));
                tracing::debug!(target: "arm_syscall::debug_print", msg = %String::from_utf8_lossy(&bytes));
                Ok(SyscallOutcome::Continue)
            }
            BREAKPOINT => Ok(SyscallOutcome::DebugBreak),
            DUMP_REGISTERS => {
                let dump: String = (0..16)
                    .map(|r| format!("R{r}={:#010x} ", regs.get(r)))
                    .collect();
                self.write_console(dump.as_bytes());
                self.write_console(b"\n");
                Ok(SyscallOutcome::Continue)
            }
            DUMP_MEMORY => {
                let addr = regs.get(0);
                let len = regs.get(1).min(256);
                let mut out = String::new();
                for i in 0..len {
                    if let Ok(b) = mem.read_byte(addr + i, pc) {
                        out.push_str(&format!("{:02x} ", b));
                    }
                }
                self.write_console(out.as_bytes());
                self.write_console(b"\n");
                Ok(SyscallOutcome::Continue)
            }
            ASSERT => {
                if regs.get(0) == 0 {
                    Err(CpuFault::AssertionFailed { pc })
                } else {
                    Ok(SyscallOutcome::Continue)
                }
            }
            other => {
                tracing::warn!(number = other, "unknown syscall number, treated as no-op");
                Ok(SyscallOutcome::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arm_memory::{MemoryBus, Perms, Segment};

    fn bus() -> MemoryBus {
        let mut bus = MemoryBus::new();
        bus.add_segment(Segment::new("data", 0x9000, 0x1000, Perms::RW))
            .unwrap();
        bus
    }

    fn syscalls() -> Syscalls {
        Syscalls::new(
            SyscallConfig {
                fs_root: std::env::temp_dir(),
                rng_seed: 1,
                clock_start_ms: 0,
                args: vec![],
                env: vec![],
                heap_base: 0x9000,
                heap_len: 0x1000,
            },
            Box::new(BufferConsole::default()),
        )
    }

    #[test]
    fn write_string_reads_until_nul() {
        let mut mem = bus();
        mem.load_bytes(0x9000, b"hi\0").unwrap();
        let mut sys = syscalls();
        let mut regs = Registers::default();
        regs.set(0, 0x9000);
        sys.handle(numbers::WRITE_STRING, 0, &mut regs, &mut mem).unwrap();
        // peek at the console through a downcast-free helper: re-run via write_cstr path
        assert_eq!(sys.write_cstr(&mem, 0x9000), b"hi");
    }

    #[test]
    fn read_char_waits_when_empty_then_returns_byte() {
        let mut mem = bus();
        let mut sys = syscalls();
        let mut regs = Registers::default();
        assert_eq!(
            sys.handle(numbers::READ_CHAR, 0, &mut regs, &mut mem).unwrap(),
            SyscallOutcome::WaitForInput
        );
        sys.stdin_mut().push_bytes(b"A");
        assert_eq!(
            sys.handle(numbers::READ_CHAR, 0, &mut regs, &mut mem).unwrap(),
            SyscallOutcome::Continue
        );
        assert_eq!(regs.get(0), b'A' as u32);
    }

    #[test]
    fn exit_halts_with_code() {
        let mut mem = bus();
        let mut sys = syscalls();
        let mut regs = Registers::default();
        regs.set(0, 5);
        let outcome = sys.handle(numbers::EXIT, 0, &mut regs, &mut mem).unwrap();
        assert_eq!(outcome, SyscallOutcome::Halt { exit_code: 5 });
    }

    #[test]
    fn assert_false_faults() {
        let mut mem = bus();
        let mut sys = syscalls();
        let mut regs = Registers::default();
        regs.set(0, 0);
        let err = sys.handle(numbers::ASSERT, 0x8000, &mut regs, &mut mem).unwrap_err();
        assert!(matches!(err, CpuFault::AssertionFailed { pc: 0x8000 }));
    }
}
