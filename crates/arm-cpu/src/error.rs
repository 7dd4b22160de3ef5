use crate::decode::UndefinedInstruction;
use arm_memory::MemError;
use thiserror::Error;

/// A fault raised during `step()`. The debug controller records this as the
/// cause of an `error`-state transition (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuFault {
    #[error("fetch fault at pc {pc:#010x}: {source}")]
    FetchFault { pc: u32, source: MemError },

    #[error("data abort at pc {pc:#010x}: {source}")]
    DataAbort { pc: u32, source: MemError },

    #[error(transparent)]
    UndefinedInstruction(#[from] UndefinedInstruction),

    #[error("assertion failed at pc {pc:#010x}")]
    AssertionFailed { pc: u32 },

    #[error("filesystem sandbox escape at pc {pc:#010x}")]
    SecurityFault { pc: u32 },
}
