//! Fetch/decode/execute loop (§4.2).

use crate::barrel::Operand2;
use crate::cpsr::Cpsr;
use crate::decode::{self, BlockTransfer, DataOp, DataProcessing, IndexMode, Instruction, Multiply, OffsetOrigin, SingleTransfer};
use crate::error::CpuFault;
use crate::registers::{Registers, LR, PC};
use arm_memory::MemoryBus;

/// Outcome handed back to a caller from one `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Instruction retired normally (including a skipped-by-condition one).
    Continued,
    /// `SWI #0x00` (or the R7-dispatch EXIT) halted the VM.
    Halted { exit_code: i32 },
    /// A `READ_CHAR`/`READ_STRING`/`READ_INT` syscall found the stdin queue
    /// empty; the caller must park until more input arrives.
    WaitingForInput,
    /// `SWI #0xF1` (BREAKPOINT) requested a debugger pause.
    DebugBreak,
}

/// Result of dispatching a syscall, reported back by the injected handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    Continue,
    Halt { exit_code: i32 },
    WaitForInput,
    DebugBreak,
}

/// Implemented by the syscall layer (`arm-syscall`); kept as a trait here so
/// `arm-cpu` has no dependency on it, matching the layering in §2.
pub trait SyscallHandler {
    fn handle(
        &mut self,
        number: u32,
        pc: u32,
        regs: &mut Registers,
        mem: &mut MemoryBus,
    ) -> Result<SyscallOutcome, CpuFault>;
}

/// The CPU core: register file, flags, and the fetch/decode/execute loop,
/// parametrized over a memory bus and syscall handler supplied by the
/// owning session.
pub struct Cpu<'a> {
    pub regs: Registers,
    pub cpsr: Cpsr,
    pub halted: bool,
    mem: &'a mut MemoryBus,
    syscalls: &'a mut dyn SyscallHandler,
}

impl<'a> Cpu<'a> {
    pub fn new(mem: &'a mut MemoryBus, syscalls: &'a mut dyn SyscallHandler) -> Self {
        Self {
            regs: Registers::default(),
            cpsr: Cpsr::default(),
            halted: false,
            mem,
            syscalls,
        }
    }

    pub fn reset(&mut self, entry_point: u32, stack_top: u32) {
        self.regs.reset();
        self.regs.set_pc(entry_point);
        self.regs.set_sp(stack_top);
        self.cpsr = Cpsr::default();
        self.halted = false;
    }

    /// Execute exactly one instruction. The visible PC during execution is
    /// `address + 8` (§3, §9); callers observe this via `Registers::operand`.
    pub fn step(&mut self) -> Result<StepOutcome, CpuFault> {
        if self.halted {
            return Ok(StepOutcome::Halted { exit_code: 0 });
        }
        let pc = self.regs.pc();
        let word = self
            .mem
            .fetch_word(pc)
            .map_err(|source| CpuFault::FetchFault { pc, source })?;
        let decoded = decode::decode(word)?;

        if !decoded.cond.is_satisfied(self.cpsr) {
            self.regs.set_pc(pc.wrapping_add(4));
            return Ok(StepOutcome::Continued);
        }

        let outcome = match decoded.kind {
            Instruction::DataProcessing(dp) => {
                self.exec_data_processing(dp);
                self.regs.set_pc(pc.wrapping_add(4));
                StepOutcome::Continued
            }
            Instruction::Multiply(m) => {
                self.exec_multiply(m);
                self.regs.set_pc(pc.wrapping_add(4));
                StepOutcome::Continued
            }
            Instruction::SingleTransfer(st) => {
                self.exec_single_transfer(st, pc)?;
                if st.rd != PC || !st.load {
                    self.regs.set_pc(pc.wrapping_add(4));
                }
                StepOutcome::Continued
            }
            Instruction::BlockTransfer(bt) => {
                let wrote_pc = self.exec_block_transfer(bt, pc)?;
                if !wrote_pc {
                    self.regs.set_pc(pc.wrapping_add(4));
                }
                StepOutcome::Continued
            }
            Instruction::Branch { offset, link } => {
                if link {
                    self.regs.set(LR, pc.wrapping_add(4));
                }
                let target = (self.regs.visible_pc() as i64 + offset as i64) as u32;
                self.regs.set_pc(target);
                StepOutcome::Continued
            }
            Instruction::Swi { number } => {
                let effective_number = if number == 0 && self.regs.get(7) <= 7 && self.regs.get(7) != 0 {
                    self.regs.get(7)
                } else {
                    number
                };
                match self
                    .syscalls
                    .handle(effective_number, pc, &mut self.regs, self.mem)?
                {
                    SyscallOutcome::Continue => {
                        self.regs.set_pc(pc.wrapping_add(4));
                        StepOutcome::Continued
                    }
                    SyscallOutcome::Halt { exit_code } => {
                        self.halted = true;
                        StepOutcome::Halted { exit_code }
                    }
                    SyscallOutcome::WaitForInput => StepOutcome::WaitingForInput,
                    SyscallOutcome::DebugBreak => {
                        self.regs.set_pc(pc.wrapping_add(4));
                        StepOutcome::DebugBreak
                    }
                }
            }
        };

        Ok(outcome)
    }

    /// Step repeatedly until `predicate` returns true or a fault occurs.
    pub fn run_until(
        &mut self,
        mut predicate: impl FnMut(&Cpu) -> bool,
    ) -> Result<StepOutcome, CpuFault> {
        loop {
            let outcome = self.step()?;
            if !matches!(outcome, StepOutcome::Continued) || predicate(self) {
                return Ok(outcome);
            }
        }
    }

    fn exec_data_processing(&mut self, dp: DataProcessing) {
        let carry_in = self.cpsr.c;
        let shifted = dp.operand2.eval(&self.regs, carry_in);
        let rn_val = if dp.op.uses_rn() {
            self.regs.operand(dp.rn)
        } else {
            0
        };

        let (result, carry_out, overflow) = alu_compute(dp.op, rn_val, shifted.value, carry_in);

        if !dp.op.is_comparison() {
            self.regs.set(dp.rd, result);
        }

        if dp.s {
            self.cpsr.n = (result as i32) < 0;
            self.cpsr.z = result == 0;
            if dp.op.is_logical() {
                self.cpsr.c = shifted.carry;
            } else {
                self.cpsr.c = carry_out;
                self.cpsr.v = overflow;
            }
        }
    }

    fn exec_multiply(&mut self, m: Multiply) {
        let rm = self.regs.operand(m.rm);
        let rs = self.regs.operand(m.rs);
        let mut result = rm.wrapping_mul(rs);
        if m.accumulate {
            result = result.wrapping_add(self.regs.operand(m.rn));
        }
        self.regs.set(m.rd, result);
        if m.s {
            self.cpsr.n = (result as i32) < 0;
            self.cpsr.z = result == 0;
        }
    }

    fn resolve_offset(&self, offset: OffsetOrigin) -> u32 {
        match offset {
            OffsetOrigin::Immediate(v) => v,
            OffsetOrigin::Register { rm, kind, amount } => {
                Operand2::ShiftByImmediate { rm, kind, amount }
                    .eval(&self.regs, self.cpsr.c)
                    .value
            }
        }
    }

    fn exec_single_transfer(&mut self, st: SingleTransfer, pc: u32) -> Result<(), CpuFault> {
        let offset = self.resolve_offset(st.offset);
        let base = self.regs.operand(st.rn);
        let indexed_addr = if st.up {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };

        let transfer_addr = match st.index_mode {
            IndexMode::Offset | IndexMode::PreIndexed => indexed_addr,
            IndexMode::PostIndexed => base,
        };

        if st.load {
            let value = if st.byte {
                self.mem
                    .read_byte(transfer_addr, pc)
                    .map_err(|source| CpuFault::DataAbort { pc, source })? as u32
            } else {
                self.mem
                    .read_word(transfer_addr, pc)
                    .map_err(|source| CpuFault::DataAbort { pc, source })?
            };
            self.regs.set(st.rd, value);
        } else {
            let value = self.regs.operand(st.rd);
            if st.byte {
                self.mem
                    .write_byte(transfer_addr, value as u8, pc)
                    .map_err(|source| CpuFault::DataAbort { pc, source })?;
            } else {
                self.mem
                    .write_word(transfer_addr, value, pc)
                    .map_err(|source| CpuFault::DataAbort { pc, source })?;
            }
        }

        match st.index_mode {
            IndexMode::PreIndexed => self.regs.set(st.rn, indexed_addr),
            IndexMode::PostIndexed => self.regs.set(st.rn, indexed_addr),
            IndexMode::Offset => {}
        }

        Ok(())
    }

    /// Returns true if R15 (PC) was among the registers loaded, meaning the
    /// caller must not re-advance PC by 4.
    fn exec_block_transfer(&mut self, bt: BlockTransfer, pc: u32) -> Result<bool, CpuFault> {
        let base = self.regs.operand(bt.rn);
        let count = bt.register_list.count_ones();
        let size = count as u32 * 4;

        // Registers are always transferred in increasing register-number
        // order at increasing addresses (§4.2 "all addressing modes" —
        // IA/IB/DA/DB, aliased by assemblers as FD/FA/ED/EA for PUSH/POP).
        let lowest = match (bt.up, bt.pre_increment) {
            (true, false) => base,                    // IA
            (true, true) => base.wrapping_add(4),      // IB
            (false, false) => base.wrapping_sub(size).wrapping_add(4), // DA
            (false, true) => base.wrapping_sub(size),  // DB
        };
        let mut addr = lowest;

        let mut wrote_pc = false;
        for reg in 0..16u32 {
            if bt.register_list & (1 << reg) == 0 {
                continue;
            }
            let reg = reg as usize;
            if bt.load {
                let value = self
                    .mem
                    .read_word(addr, pc)
                    .map_err(|source| CpuFault::DataAbort { pc, source })?;
                self.regs.set(reg, value);
                if reg == PC {
                    wrote_pc = true;
                }
            } else {
                let value = self.regs.operand(reg);
                self.mem
                    .write_word(addr, value, pc)
                    .map_err(|source| CpuFault::DataAbort { pc, source })?;
            }
            addr = addr.wrapping_add(4);
        }

        if bt.writeback {
            let new_base = if bt.up {
                base.wrapping_add(size)
            } else {
                base.wrapping_sub(size)
            };
            self.regs.set(bt.rn, new_base);
        }

        // `user_bank` (the S-bit outside a trap vector) is unspecified and
        // emulated as a no-op per §4.2 / §9 open question.
        let _ = bt.user_bank;

        Ok(wrote_pc)
    }
}

/// Compute a data-processing ALU result plus its carry-out/overflow, used
/// only when `S` requires arithmetic (non-logical) flag semantics.
fn alu_compute(op: DataOp, rn: u32, op2: u32, carry_in: bool) -> (u32, bool, bool) {
    use DataOp::*;
    match op {
        And | Tst => (rn & op2, false, false),
        Eor | Teq => (rn ^ op2, false, false),
        Orr => (rn | op2, false, false),
        Mov => (op2, false, false),
        Bic => (rn & !op2, false, false),
        Mvn => (!op2, false, false),
        Sub | Cmp => sub_with_flags(rn, op2),
        Rsb => sub_with_flags(op2, rn),
        Add | Cmn => add_with_flags(rn, op2),
        Adc => add_with_carry(rn, op2, carry_in),
        Sbc => sub_with_carry(rn, op2, carry_in),
        Rsc => sub_with_carry(op2, rn, carry_in),
    }
}

fn add_with_flags(a: u32, b: u32) -> (u32, bool, bool) {
    let (result, carry) = a.overflowing_add(b);
    let overflow = ((a as i32).checked_add(b as i32)).is_none() || sign_overflow_add(a, b, result);
    (result, carry, overflow)
}

fn sign_overflow_add(a: u32, b: u32, result: u32) -> bool {
    ((a ^ result) & (b ^ result)) >> 31 != 0
}

fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let (r1, c1) = a.overflowing_add(b);
    let (result, c2) = r1.overflowing_add(carry_in as u32);
    let overflow = sign_overflow_add(a, b, result);
    (result, c1 || c2, overflow)
}

fn sub_with_flags(a: u32, b: u32) -> (u32, bool, bool) {
    let (result, borrow) = a.overflowing_sub(b);
    let overflow = ((a ^ b) & (a ^ result)) >> 31 != 0;
    (result, !borrow, overflow)
}

fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let not_carry = !carry_in as u32;
    let (r1, b1) = a.overflowing_sub(b);
    let (result, b2) = r1.overflowing_sub(not_carry);
    let overflow = ((a ^ b) & (a ^ result)) >> 31 != 0;
    (result, !(b1 || b2), overflow)
}
