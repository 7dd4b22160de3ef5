//! ARMv2 register file, CPSR, decoder and fetch/decode/execute loop (§4.2).

mod barrel;
mod cpsr;
mod decode;
mod error;
mod execute;
mod registers;

pub use barrel::{Operand2, ShiftKind, Shifted};
pub use cpsr::{Condition, Cpsr};
pub use decode::{
    decode, BlockTransfer, DataOp, DataProcessing, DecodedInstruction, IndexMode, Instruction,
    Multiply, OffsetOrigin, SingleTransfer, UndefinedInstruction,
};
pub use error::CpuFault;
pub use execute::{Cpu, StepOutcome, SyscallHandler, SyscallOutcome};
pub use registers::{Registers, LR, PC, SP};

#[cfg(test)]
mod tests {
    use super::*;
    use arm_memory::{MemoryBus, Perms, Segment};

    struct NoSyscalls;
    impl SyscallHandler for NoSyscalls {
        fn handle(
            &mut self,
            _number: u32,
            _pc: u32,
            _regs: &mut Registers,
            _mem: &mut arm_memory::MemoryBus,
        ) -> Result<SyscallOutcome, CpuFault> {
            Ok(SyscallOutcome::Continue)
        }
    }

    fn bus() -> MemoryBus {
        let mut bus = MemoryBus::new();
        bus.add_segment(Segment::new("code", 0x8000, 0x1000, Perms::RWX))
            .unwrap();
        bus.add_segment(Segment::new("data", 0x9000, 0x1000, Perms::RW))
            .unwrap();
        bus
    }

    fn emit(bus: &mut MemoryBus, addr: u32, word: u32) {
        bus.load_bytes(addr, &word.to_le_bytes()).unwrap();
    }

    #[test]
    fn mov_immediate_sets_register() {
        let mut bus = bus();
        // MOV R0, #42 (cond=AL, I=1, op=MOV, S=0, Rd=0, imm=42 rot=0)
        let word = 0xE3A0_002A;
        emit(&mut bus, 0x8000, word);
        let mut nop = NoSyscalls;
        let mut cpu = Cpu::new(&mut bus, &mut nop);
        cpu.reset(0x8000, 0x9000 + 0x1000);
        let outcome = cpu.step().unwrap();
        assert_eq!(outcome, StepOutcome::Continued);
        assert_eq!(cpu.regs.get(0), 42);
        assert_eq!(cpu.regs.pc(), 0x8004);
    }

    #[test]
    fn visible_pc_is_address_plus_8() {
        let mut bus = bus();
        // ADD R0, PC, #0  -> R0 should equal pc + 8
        let word = 0xE28F_0000;
        emit(&mut bus, 0x8000, word);
        let mut nop = NoSyscalls;
        let mut cpu = Cpu::new(&mut bus, &mut nop);
        cpu.reset(0x8000, 0x9000 + 0x1000);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.get(0), 0x8008);
    }

    #[test]
    fn branch_targets_are_pc_relative_from_pipelined_pc() {
        let mut bus = bus();
        // B #0x20 forward: offset field = (0x20/4) - 2 = 6 (since pc is already +8 ahead of fetch addr, and branch target = pipelined_pc + offset*4)
        // Encode B with raw 24-bit offset such that target = fetch_addr + 8 + offset*4
        let target = 0x8030u32;
        let fetch_addr = 0x8000u32;
        let rel = (target as i64 - (fetch_addr as i64 + 8)) / 4;
        let word = 0xEA00_0000 | (rel as u32 & 0x00ff_ffff);
        emit(&mut bus, fetch_addr, word);
        let mut nop = NoSyscalls;
        let mut cpu = Cpu::new(&mut bus, &mut nop);
        cpu.reset(fetch_addr, 0x9000 + 0x1000);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc(), target);
    }

    #[test]
    fn cmp_sets_flags_without_writing_destination() {
        let mut bus = bus();
        // CMP R0, #0 with R0=0 -> Z=1
        let word = 0xE350_0000;
        emit(&mut bus, 0x8000, word);
        let mut nop = NoSyscalls;
        let mut cpu = Cpu::new(&mut bus, &mut nop);
        cpu.reset(0x8000, 0x9000 + 0x1000);
        cpu.step().unwrap();
        assert!(cpu.cpsr.z);
        assert_eq!(cpu.regs.get(0), 0);
    }

    #[test]
    fn failed_condition_still_advances_pc_without_side_effect() {
        let mut bus = bus();
        // MOVEQ R0, #1 while Z=0 (default reset state) should not execute.
        let word = 0x03A0_0001;
        emit(&mut bus, 0x8000, word);
        let mut nop = NoSyscalls;
        let mut cpu = Cpu::new(&mut bus, &mut nop);
        cpu.reset(0x8000, 0x9000 + 0x1000);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.get(0), 0);
        assert_eq!(cpu.regs.pc(), 0x8004);
    }
}
