//! Execution state machine (§4.6): `idle → (load) → idle → (run/step) →
//! running → (event/pause) → paused-at-breakpoint | waiting-for-input |
//! halted | error → (reset) → idle`. Every edge publishes a [`StateEvent`].

use crate::breakpoint::WatchpointHit;
use arm_cpu::CpuFault;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecState {
    Idle,
    Running,
    PausedAtBreakpoint { breakpoint_id: u32, pc: u32 },
    PausedAtWatchpoint { hit: WatchpointHitRecord },
    Paused { pc: u32 },
    WaitingForInput,
    Halted { exit_code: i32 },
    Error { fault: String, pc: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchpointHitRecord {
    pub watchpoint_id: u32,
    pub addr: u32,
    pub old_value: u32,
    pub new_value: u32,
}

impl From<WatchpointHit> for WatchpointHitRecord {
    fn from(hit: WatchpointHit) -> Self {
        Self {
            watchpoint_id: hit.watchpoint_id,
            addr: hit.addr,
            old_value: hit.old_value,
            new_value: hit.new_value,
        }
    }
}

impl ExecState {
    pub fn is_terminal_for_run(&self) -> bool {
        !matches!(self, ExecState::Running)
    }

    pub fn from_fault(fault: &CpuFault, pc: u32) -> Self {
        ExecState::Error { fault: fault.to_string(), pc }
    }
}

/// Published on every state-machine edge (§4.6 "every edge publishes a
/// state event"). The session layer forwards these onto the broadcaster.
#[derive(Debug, Clone)]
pub struct StateEvent {
    pub from: ExecState,
    pub to: ExecState,
}
