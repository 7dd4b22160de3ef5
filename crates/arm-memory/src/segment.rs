use bitflags::bitflags;

bitflags! {
    /// Permission set drawn from {read, write, execute} per §3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perms: u8 {
        const READ    = 0b001;
        const WRITE   = 0b010;
        const EXECUTE = 0b100;
    }
}

impl Perms {
    pub const RX: Perms = Perms::READ.union(Perms::EXECUTE);
    pub const RW: Perms = Perms::READ.union(Perms::WRITE);
    pub const RWX: Perms = Perms::READ.union(Perms::WRITE).union(Perms::EXECUTE);
}

/// A named, contiguous range of little-endian bytes with its own
/// permission set. Segments never overlap (§3 invariant).
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: &'static str,
    pub base: u32,
    pub len: u32,
    pub perms: Perms,
    pub(crate) bytes: Vec<u8>,
}

impl Segment {
    pub fn new(name: &'static str, base: u32, len: u32, perms: Perms) -> Self {
        Self {
            name,
            base,
            len,
            perms,
            bytes: vec![0u8; len as usize],
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        let end = self.base.wrapping_add(self.len);
        addr >= self.base && addr < end
    }

    /// True if the half-open byte range `[addr, addr+size)` is fully inside
    /// this segment. Accesses that straddle a boundary must be rejected by
    /// the caller rather than silently clamped.
    pub fn contains_range(&self, addr: u32, size: u32) -> bool {
        if size == 0 {
            return self.contains(addr);
        }
        let last = match addr.checked_add(size - 1) {
            Some(v) => v,
            None => return false,
        };
        self.contains(addr) && self.contains(last)
    }

    fn offset(&self, addr: u32) -> usize {
        (addr - self.base) as usize
    }

    pub fn read_slice(&self, addr: u32, size: u32) -> &[u8] {
        let off = self.offset(addr);
        &self.bytes[off..off + size as usize]
    }

    pub fn write_slice(&mut self, addr: u32, data: &[u8]) {
        let off = self.offset(addr);
        self.bytes[off..off + data.len()].copy_from_slice(data);
    }
}
