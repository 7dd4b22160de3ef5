//! Breakpoints and watchpoints (§4.6): `add/remove/enable/disable_breakpoint`,
//! `add/remove_watchpoint`, and the records the Debug controller keeps for
//! each.

/// A breakpoint on instruction fetch at a given address (§4.3).
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub id: u32,
    pub addr: u32,
    pub enabled: bool,
    pub condition: Option<String>,
    pub hit_count: u32,
    /// Deleted the first time it fires; used internally by `step_over` and
    /// `step_out`, and exposed to callers as `tbreak`.
    pub temporary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Read,
    Write,
    ReadWrite,
}

impl WatchKind {
    pub fn matches(self, is_write: bool) -> bool {
        match self {
            WatchKind::Read => !is_write,
            WatchKind::Write => is_write,
            WatchKind::ReadWrite => true,
        }
    }
}

/// A memory-range watchpoint (§4.3). `addr_range` is inclusive-start,
/// exclusive-end, matching `Segment`'s own convention.
#[derive(Debug, Clone)]
pub struct Watchpoint {
    pub id: u32,
    pub addr_range: (u32, u32),
    pub kind: WatchKind,
    pub enabled: bool,
}

impl Watchpoint {
    pub fn covers(&self, addr: u32, size: u8) -> bool {
        let end = addr.wrapping_add(size as u32);
        addr < self.addr_range.1 && end > self.addr_range.0
    }
}

/// Recorded the moment a watchpoint fires, carried in the paused state
/// (§4.6 "records the triggering address, kind, old value, and new value").
#[derive(Debug, Clone, Copy)]
pub struct WatchpointHit {
    pub watchpoint_id: u32,
    pub addr: u32,
    pub kind: WatchKind,
    pub old_value: u32,
    pub new_value: u32,
}
