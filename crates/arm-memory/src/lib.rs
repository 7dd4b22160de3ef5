//! Segmented byte-addressable memory for the ARMv2 emulator.
//!
//! A [`MemoryBus`] is an ordered set of named [`Segment`]s. Address lookup
//! is exact: at most one segment may contain any address (§3 invariant).
//! Permissions are checked before alignment so that a permission failure on
//! a misaligned address is reported as a permission error, not an alignment
//! one, matching the CPU core's fault classification in §4.1.

mod error;
mod segment;

pub use error::{AccessKind, MemError, MemResult};
pub use segment::{Perms, Segment};

use std::sync::Arc;

/// Observer invoked on every *successful* access, used by watchpoints and
/// the trace engines (§4.7). Registered observers must not themselves
/// perform blocking I/O; they run inline with the access.
pub trait MemoryObserver: Send + Sync {
    fn on_access(&self, event: AccessEvent);
}

/// `(addr, size, kind, value, pc)` as specified by the memory manager
/// contract in §4.1.
#[derive(Debug, Clone, Copy)]
pub struct AccessEvent {
    pub addr: u32,
    pub size: u8,
    pub kind: AccessKind,
    pub value: u32,
    pub pc: u32,
}

/// The memory manager. Owned exclusively by a session's CPU core; readers
/// that need a snapshot take their own copy rather than sharing this type
/// across threads (see `armd`'s session-scoped locking in §5).
pub struct MemoryBus {
    segments: Vec<Segment>,
    observer: Option<Arc<dyn MemoryObserver>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn MemoryObserver>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Add a segment. Fails if it overlaps any existing segment.
    pub fn add_segment(&mut self, segment: Segment) -> MemResult<()> {
        let new_end = segment.base.wrapping_add(segment.len);
        for existing in &self.segments {
            let existing_end = existing.base.wrapping_add(existing.len);
            let overlaps = segment.base < existing_end && existing.base < new_end;
            if overlaps {
                return Err(MemError::SegmentOverlap {
                    name: segment.name,
                });
            }
        }
        tracing::debug!(
            name = segment.name,
            base = format!("{:#010x}", segment.base),
            len = segment.len,
            "mapped segment"
        );
        self.segments.push(segment);
        self.segments.sort_by_key(|s| s.base);
        Ok(())
    }

    pub fn segment_for(&self, addr: u32) -> Option<&Segment> {
        // Segment count is small (a handful); binary search on sorted
        // bases is the O(log N) lookup the contract calls for.
        let idx = self
            .segments
            .partition_point(|s| s.base <= addr)
            .checked_sub(1)?;
        let candidate = &self.segments[idx];
        candidate.contains(addr).then_some(candidate)
    }

    fn segment_for_mut(&mut self, addr: u32) -> Option<&mut Segment> {
        let idx = self
            .segments
            .partition_point(|s| s.base <= addr)
            .checked_sub(1)?;
        let candidate = &mut self.segments[idx];
        candidate.contains(addr).then_some(candidate)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn check_access(
        &self,
        addr: u32,
        size: u8,
        kind: AccessKind,
    ) -> MemResult<&Segment> {
        let seg = self.segment_for(addr).ok_or(MemError::Unmapped { addr })?;
        if !seg.contains_range(addr, size as u32) {
            return Err(MemError::StraddlesSegment { addr, size });
        }
        let needed = match kind {
            AccessKind::Read => Perms::READ,
            AccessKind::Write => Perms::WRITE,
            AccessKind::Execute => Perms::EXECUTE,
        };
        if !seg.perms.contains(needed) {
            return Err(MemError::PermissionDenied { addr, kind });
        }
        if size > 1 && addr % size as u32 != 0 {
            return Err(MemError::Misaligned { addr, size });
        }
        Ok(seg)
    }

    fn notify(&self, addr: u32, size: u8, kind: AccessKind, value: u32, pc: u32) {
        if let Some(obs) = &self.observer {
            obs.on_access(AccessEvent {
                addr,
                size,
                kind,
                value,
                pc,
            });
        }
    }

    pub fn read_byte(&self, addr: u32, pc: u32) -> MemResult<u8> {
        let seg = self.check_access(addr, 1, AccessKind::Read)?;
        let v = seg.read_slice(addr, 1)[0];
        self.notify(addr, 1, AccessKind::Read, v as u32, pc);
        Ok(v)
    }

    pub fn read_half(&self, addr: u32, pc: u32) -> MemResult<u16> {
        let seg = self.check_access(addr, 2, AccessKind::Read)?;
        let bytes = seg.read_slice(addr, 2);
        let v = u16::from_le_bytes([bytes[0], bytes[1]]);
        self.notify(addr, 2, AccessKind::Read, v as u32, pc);
        Ok(v)
    }

    pub fn read_word(&self, addr: u32, pc: u32) -> MemResult<u32> {
        let seg = self.check_access(addr, 4, AccessKind::Read)?;
        let bytes = seg.read_slice(addr, 4);
        let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.notify(addr, 4, AccessKind::Read, v, pc);
        Ok(v)
    }

    /// Fetch for instruction decode: same as `read_word` but checked
    /// against the execute permission instead of read.
    pub fn fetch_word(&self, addr: u32) -> MemResult<u32> {
        let seg = self.check_access(addr, 4, AccessKind::Execute)?;
        let bytes = seg.read_slice(addr, 4);
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_byte(&mut self, addr: u32, value: u8, pc: u32) -> MemResult<()> {
        self.check_access(addr, 1, AccessKind::Write)?;
        self.segment_for_mut(addr).unwrap().write_slice(addr, &[value]);
        self.notify(addr, 1, AccessKind::Write, value as u32, pc);
        Ok(())
    }

    pub fn write_half(&mut self, addr: u32, value: u16, pc: u32) -> MemResult<()> {
        self.check_access(addr, 2, AccessKind::Write)?;
        self.segment_for_mut(addr)
            .unwrap()
            .write_slice(addr, &value.to_le_bytes());
        self.notify(addr, 2, AccessKind::Write, value as u32, pc);
        Ok(())
    }

    pub fn write_word(&mut self, addr: u32, value: u32, pc: u32) -> MemResult<()> {
        self.check_access(addr, 4, AccessKind::Write)?;
        self.segment_for_mut(addr)
            .unwrap()
            .write_slice(addr, &value.to_le_bytes());
        self.notify(addr, 4, AccessKind::Write, value, pc);
        Ok(())
    }

    /// Raw write bypassing the write-permission check, used only by the
    /// loader to materialize instructions/literals into the code segment.
    pub fn load_bytes(&mut self, addr: u32, data: &[u8]) -> MemResult<()> {
        let seg = self
            .segment_for(addr)
            .ok_or(MemError::Unmapped { addr })?;
        if !seg.contains_range(addr, data.len() as u32) {
            return Err(MemError::StraddlesSegment {
                addr,
                size: data.len() as u8,
            });
        }
        self.segment_for_mut(addr).unwrap().write_slice(addr, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_with_code_and_data() -> MemoryBus {
        let mut bus = MemoryBus::new();
        bus.add_segment(Segment::new("code", 0x8000, 0x1000, Perms::RWX))
            .unwrap();
        bus.add_segment(Segment::new("data", 0x9000, 0x1000, Perms::RW))
            .unwrap();
        bus
    }

    #[test]
    fn overlapping_segments_rejected() {
        let mut bus = MemoryBus::new();
        bus.add_segment(Segment::new("a", 0x1000, 0x100, Perms::RW))
            .unwrap();
        let err = bus
            .add_segment(Segment::new("b", 0x1080, 0x100, Perms::RW))
            .unwrap_err();
        assert!(matches!(err, MemError::SegmentOverlap { .. }));
    }

    #[test]
    fn word_roundtrip() {
        let mut bus = bus_with_code_and_data();
        bus.write_word(0x9000, 0xdead_beef, 0).unwrap();
        assert_eq!(bus.read_word(0x9000, 0).unwrap(), 0xdead_beef);
    }

    #[test]
    fn misaligned_word_rejected() {
        let bus = bus_with_code_and_data();
        let err = bus.read_word(0x9001, 0).unwrap_err();
        assert!(matches!(err, MemError::Misaligned { .. }));
    }

    #[test]
    fn byte_access_has_no_alignment_restriction() {
        let mut bus = bus_with_code_and_data();
        bus.write_byte(0x9003, 0x7f, 0).unwrap();
        assert_eq!(bus.read_byte(0x9003, 0).unwrap(), 0x7f);
    }

    #[test]
    fn unmapped_read_fails() {
        let bus = bus_with_code_and_data();
        let err = bus.read_word(0x1234, 0).unwrap_err();
        assert!(matches!(err, MemError::Unmapped { .. }));
    }

    #[test]
    fn write_to_read_only_denied() {
        let mut bus = MemoryBus::new();
        bus.add_segment(Segment::new("rodata", 0x2000, 0x100, Perms::READ))
            .unwrap();
        let err = bus.write_word(0x2000, 1, 0).unwrap_err();
        assert!(matches!(err, MemError::PermissionDenied { .. }));
    }

    #[test]
    fn straddling_segment_boundary_fails() {
        let bus = bus_with_code_and_data();
        // code ends at 0x9000 exclusive; a word read at 0x8ffe straddles
        // the code/data boundary.
        let err = bus.read_word(0x8ffe, 0).unwrap_err();
        assert!(matches!(err, MemError::StraddlesSegment { .. }));
    }

    struct CountingObserver(std::sync::atomic::AtomicUsize);
    impl MemoryObserver for CountingObserver {
        fn on_access(&self, _event: AccessEvent) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn observer_only_fires_on_success() {
        let mut bus = bus_with_code_and_data();
        let obs = Arc::new(CountingObserver(std::sync::atomic::AtomicUsize::new(0)));
        bus.set_observer(obs.clone());
        bus.write_word(0x9000, 1, 0).unwrap();
        assert!(bus.write_word(0x1234, 1, 0).is_err());
        assert_eq!(obs.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
