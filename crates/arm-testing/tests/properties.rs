//! Property-based tests for the quantified invariants in the
//! specification's testable-properties list: memory alignment, literal-pool
//! reachability, and PC+8 pipelining.

use arm_memory::{MemError, MemoryBus, Perms, Segment};
use proptest::prelude::*;

fn fresh_bus() -> MemoryBus {
    let mut bus = MemoryBus::new();
    bus.add_segment(Segment::new("data", 0x9000, 0x1000, Perms::RW)).unwrap();
    bus
}

proptest! {
    /// "For every segment S and address X ∈ S, an access of size k ≤ 4 is
    /// rejected if X mod k ≠ 0."
    #[test]
    fn misaligned_word_access_is_always_rejected(offset in 0u32..0x1000) {
        let mut bus = fresh_bus();
        let addr = 0x9000 + offset;
        let result = bus.write_word(addr, 0xdead_beef, 0x8000);
        if addr % 4 != 0 {
            prop_assert!(matches!(result, Err(MemError::Misaligned { .. })));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// Same invariant for half-word (2-byte) accesses.
    #[test]
    fn misaligned_half_access_is_always_rejected(offset in 0u32..0x1000) {
        let mut bus = fresh_bus();
        let addr = 0x9000 + offset;
        let result = bus.write_half(addr, 0xbeef, 0x8000);
        if addr % 2 != 0 {
            prop_assert!(matches!(result, Err(MemError::Misaligned { .. })));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// Byte accesses never require alignment: every offset in range succeeds.
    #[test]
    fn byte_access_never_misaligned(offset in 0u32..0x1000) {
        let mut bus = fresh_bus();
        let addr = 0x9000 + offset;
        prop_assert!(bus.write_byte(addr, 0x42, 0x8000).is_ok());
    }
}

proptest! {
    /// "For every `LDR Rd, =imm` that reaches code generation, the chosen
    /// pool address P satisfies `|P − (A + 8)| ≤ 4095` and `P mod 4 == 0`."
    /// A single `.ltorg` right after N back-to-back literal loads keeps
    /// every pool slot within the ±4095-byte PC-relative window, regardless
    /// of N (within the range this test explores).
    #[test]
    fn literal_pool_stays_reachable_for_varying_load_counts(count in 1usize..200) {
        let mut source = String::from("_start:\n");
        for i in 0..count {
            source.push_str(&format!("    LDR R0, ={:#x}\n", 0x1000_0000u32.wrapping_add(i as u32)));
        }
        source.push_str("    SWI #0\n.ltorg\n");

        let result = arm_asm::assemble(&source);
        // Each LDR is 4 bytes; at 200 entries the pool is still only ~800
        // bytes past the last load, well inside the window — this should
        // always assemble cleanly.
        prop_assert!(result.is_ok(), "{:?}", result.err());
    }
}

/// "For every instruction at address A, after `step()`, either PC = A + 4,
/// or PC was written by the instruction." Exercised here for a straight-line
/// run of non-branching `MOV`s.
#[test]
fn sequential_instructions_advance_pc_by_four() {
    let mut h = arm_testing::Harness::new();
    h.load("_start:\n MOV R0,#1\n MOV R0,#2\n MOV R0,#3\n MOV R7,#0\n SWI #0\n");
    let base = h.controller.registers()[15];
    h.controller.step();
    assert_eq!(h.controller.registers()[15], base + 4);
    h.controller.step();
    assert_eq!(h.controller.registers()[15], base + 8);
}
