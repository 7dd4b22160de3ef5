//! Test harness for the ARMv2 emulator workspace: helpers shared by the
//! integration suites under `tests/`, the transformed descendant of the
//! teacher's `crates/testing` harness crate, scoped down to this workspace's
//! actual surface (no QEMU runtime, no NPU backend, no distributed/Byzantine
//! suites — those had no counterpart here).

use arm_debug::{DebugController, ExecState};
use arm_syscall::SyscallConfig;
use tempfile::TempDir;

/// Owns the `TempDir` so the sandboxed `fs_root` stays alive for the test's
/// duration, alongside the controller under test.
pub struct Harness {
    pub controller: DebugController,
    _fs_root: TempDir,
}

impl Harness {
    /// A fresh controller with a scratch filesystem sandbox and a fixed RNG
    /// seed, so tests are deterministic (§8 "randomness and time syscalls
    /// must be seedable for tests").
    pub fn new() -> Self {
        Self::with_seed(0x5eed_5eed)
    }

    pub fn with_seed(rng_seed: u64) -> Self {
        let fs_root = TempDir::new().expect("failed to create sandbox dir");
        let config = SyscallConfig {
            fs_root: fs_root.path().to_path_buf(),
            rng_seed,
            clock_start_ms: 0,
            args: Vec::new(),
            env: Vec::new(),
            heap_base: 0,
            heap_len: 0x1_0000,
        };
        Self { controller: DebugController::new(config), _fs_root: fs_root }
    }

    /// Assembles and loads `source`, panicking with the diagnostics on
    /// failure — assembly errors in a test fixture are a harness bug, not a
    /// result to assert on.
    pub fn load(&mut self, source: &str) {
        if let Err(diagnostics) = self.controller.load_program(source) {
            panic!("program failed to assemble: {diagnostics:?}");
        }
    }

    /// Runs to completion and returns the terminal state.
    pub fn run_to_completion(&mut self) -> ExecState {
        self.controller.continue_run().clone()
    }

    pub fn exit_code(state: &ExecState) -> Option<i32> {
        match state {
            ExecState::Halted { exit_code } => Some(*exit_code),
            _ => None,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
