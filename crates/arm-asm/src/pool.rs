/// A literal pool anchored at a fixed address, populated by `.ltorg` (or an
/// implicit pool at end of program) and filled with the deduplicated
/// constants referenced by `LDR Rd, =imm` since the previous anchor (§4.4).
#[derive(Debug, Clone)]
pub struct LiteralPool {
    pub address: u32,
    pub values: Vec<u32>,
}

impl LiteralPool {
    pub fn byte_len(&self) -> u32 {
        self.values.len() as u32 * 4
    }

    pub fn slot_address(&self, value: u32) -> Option<u32> {
        self.values
            .iter()
            .position(|&v| v == value)
            .map(|i| self.address + i as u32 * 4)
    }
}
