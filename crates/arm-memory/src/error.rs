use thiserror::Error;

/// Failure modes the memory manager can report to a caller.
///
/// The CPU core classifies these into fetch/data faults; the debug
/// controller records them as the cause of an `error` state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    #[error("address {addr:#010x} is not mapped by any segment")]
    Unmapped { addr: u32 },

    #[error("access of size {size} at {addr:#010x} straddles a segment boundary")]
    StraddlesSegment { addr: u32, size: u8 },

    #[error("{kind:?} access to {addr:#010x} denied by segment permissions")]
    PermissionDenied { addr: u32, kind: AccessKind },

    #[error("misaligned {size}-byte access at {addr:#010x}")]
    Misaligned { addr: u32, size: u8 },

    #[error("segment {name:?} overlaps an existing segment")]
    SegmentOverlap { name: &'static str },
}

/// Kind of memory access, also used by watchpoints and trace hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

pub type MemResult<T> = Result<T, MemError>;
