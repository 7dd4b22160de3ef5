//! Pass 2 (§4.5): resolve symbolic operands against the symbol table and
//! literal pools built in Pass 1, and emit 32-bit words.

use crate::ast::ParsedInstr;
use crate::diagnostic::Diagnostic;
use crate::layout::{Layout, PlacedInstr};
use crate::mnemonic::cond_bits;
use crate::operand::{IndexSpec, OffsetSpec, Operand2Spec};
use arm_cpu::ShiftKind;

/// Try to express `value` as an 8-bit immediate rotated right by an even
/// amount (§4.4 "8-bit-rotated-immediate encodability"). Returns
/// `(imm8, rotate_field)` where the actual rotation is `rotate_field * 2`.
pub fn try_encode_immediate(value: u32) -> Option<(u32, u32)> {
    for r in 0..16u32 {
        let rotated = value.rotate_left(r * 2);
        if rotated <= 0xff {
            return Some((rotated, r));
        }
    }
    None
}

fn shift_kind_bits(kind: ShiftKind) -> u32 {
    match kind {
        ShiftKind::Lsl => 0b00,
        ShiftKind::Lsr => 0b01,
        ShiftKind::Asr => 0b10,
        ShiftKind::Ror => 0b11,
    }
}

fn data_op_bits(name: &str) -> u32 {
    match name {
        "AND" => 0x0,
        "EOR" => 0x1,
        "SUB" => 0x2,
        "RSB" => 0x3,
        "ADD" => 0x4,
        "ADC" => 0x5,
        "SBC" => 0x6,
        "RSC" => 0x7,
        "TST" => 0x8,
        "TEQ" => 0x9,
        "CMP" => 0xa,
        "CMN" => 0xb,
        "ORR" => 0xc,
        "MOV" => 0xd,
        "BIC" => 0xe,
        _ => 0xf, // MVN
    }
}

/// Encode `operand2`, returning `(bits, immediate_flag)` where `bits` is
/// the low 12 bits of the instruction word.
fn encode_operand2(spec: Operand2Spec) -> Result<(u32, bool), String> {
    match spec {
        Operand2Spec::Imm(value) => {
            let (imm8, rotate) =
                try_encode_immediate(value).ok_or_else(|| format!("immediate {value:#x} is not representable as a rotated 8-bit value"))?;
            Ok(((rotate << 8) | imm8, true))
        }
        Operand2Spec::Reg(rm) => Ok((rm as u32, false)),
        Operand2Spec::RegShiftImm { rm, kind, amount } => {
            Ok(((amount & 0x1f) << 7 | shift_kind_bits(kind) << 5 | rm as u32, false))
        }
        Operand2Spec::RegShiftReg { rm, kind, rs } => {
            Ok((((rs as u32) << 8) | shift_kind_bits(kind) << 5 | (1 << 4) | rm as u32, false))
        }
        // RRX is encoded as ROR #0 (amount field zero, kind bits 0b11).
        Operand2Spec::Rrx(rm) => Ok(((0b11u32 << 5) | rm as u32, false)),
    }
}

fn encode_offset(spec: OffsetSpec) -> Result<(u32, bool), String> {
    match spec {
        OffsetSpec::Imm(value) => {
            if value > 0xfff {
                return Err(format!("offset {value:#x} exceeds the 12-bit immediate range"));
            }
            Ok((value, true))
        }
        OffsetSpec::Reg { rm, kind, amount } => Ok(((amount & 0x1f) << 7 | shift_kind_bits(kind) << 5 | rm as u32, false)),
    }
}

fn find_pool_slot(layout: &Layout, instr_addr: u32, value: u32) -> Result<u32, String> {
    let pipelined_pc = instr_addr.wrapping_add(8);
    for pool in &layout.pools {
        if pool.address <= instr_addr {
            continue;
        }
        if let Some(slot) = pool.slot_address(value) {
            let distance = slot as i64 - pipelined_pc as i64;
            if distance.unsigned_abs() > 4095 {
                return Err(format!(
                    "literal pool slot at {slot:#010x} for value {value:#x} is unreachable from pc {pipelined_pc:#010x} (max distance 4095)"
                ));
            }
            return Ok(slot);
        }
    }
    Err(format!("no literal pool reachable for value {value:#x} — missing '.ltorg'?"))
}

pub fn encode(layout: &Layout) -> (Vec<(u32, u32)>, Vec<Diagnostic>) {
    let mut words = Vec::with_capacity(layout.instructions.len());
    let mut diagnostics = Vec::new();

    for placed in &layout.instructions {
        match encode_one(layout, placed) {
            Ok(word) => words.push((placed.address, word)),
            Err(msg) => diagnostics.push(Diagnostic::error(placed.line, msg)),
        }
    }

    (words, diagnostics)
}

fn encode_one(layout: &Layout, placed: &PlacedInstr) -> Result<u32, String> {
    let addr = placed.address;
    match &placed.instr {
        ParsedInstr::DataProcessing { op, cond, s, rd, rn, operand2 } => {
            let (op2_bits, immediate) = encode_operand2(*operand2)?;
            let word = (cond_bits(*cond) << 28)
                | (immediate as u32) << 25
                | data_op_bits(op) << 21
                | (*s as u32) << 20
                | (*rn as u32) << 16
                | (*rd as u32) << 12
                | op2_bits;
            Ok(word)
        }
        ParsedInstr::Multiply { accumulate, cond, s, rd, rn, rs, rm } => {
            // Bits 27-22 = 0, bits 7-4 = 0b1001, matching the decoder's
            // `(word & 0x0fc0_00f0) == 0x0000_0090` multiply recognizer.
            let base = 0b0000_0000_1001_0000u32;
            let word = (cond_bits(*cond) << 28)
                | base
                | (*accumulate as u32) << 21
                | (*s as u32) << 20
                | (*rd as u32) << 16
                | (*rn as u32) << 12
                | (*rs as u32) << 8
                | (*rm as u32);
            Ok(word)
        }
        ParsedInstr::SingleTransfer { load, byte, cond, rd, mem } => {
            let (offset_bits, immediate_offset) = encode_offset(mem.offset)?;
            let (pre, writeback) = match mem.index {
                IndexSpec::Offset => (true, false),
                IndexSpec::PreIndexed => (true, true),
                IndexSpec::PostIndexed => (false, false),
            };
            let word = (cond_bits(*cond) << 28)
                | 0b01 << 26
                | (!immediate_offset as u32) << 25
                | (pre as u32) << 24
                | (mem.up as u32) << 23
                | (*byte as u32) << 22
                | (writeback as u32) << 21
                | (*load as u32) << 20
                | (mem.rn as u32) << 16
                | (*rd as u32) << 12
                | offset_bits;
            Ok(word)
        }
        ParsedInstr::LoadImmediatePseudo { cond, rd, value } => {
            let slot = find_pool_slot(layout, addr, *value)?;
            let pc = addr.wrapping_add(8);
            let (offset, up) = if slot >= pc { (slot - pc, true) } else { (pc - slot, false) };
            let word = (cond_bits(*cond) << 28)
                | 0b01 << 26
                | 1 << 24 // pre-indexed, offset addressing (no writeback)
                | (up as u32) << 23
                | 1 << 20 // load
                | (15u32) << 16 // PC base
                | (*rd as u32) << 12
                | offset;
            Ok(word)
        }
        ParsedInstr::BlockTransfer { load, cond, pre_increment, up, writeback, rn, register_list } => {
            let word = (cond_bits(*cond) << 28)
                | 0b10 << 26
                | (*pre_increment as u32) << 24
                | (*up as u32) << 23
                | (*writeback as u32) << 21
                | (*load as u32) << 20
                | (*rn as u32) << 16
                | (*register_list as u32);
            Ok(word)
        }
        ParsedInstr::Branch { link, cond, target } => {
            let dest = layout
                .symbols
                .resolve(target)
                .ok_or_else(|| format!("undefined symbol '{target}'"))?;
            let pipelined_pc = addr.wrapping_add(8);
            let byte_offset = dest as i64 - pipelined_pc as i64;
            if byte_offset % 4 != 0 {
                return Err(format!("branch target {target} is not word-aligned relative to pc"));
            }
            let word_offset = byte_offset / 4;
            if !(-(1 << 23)..(1 << 23)).contains(&word_offset) {
                return Err(format!("branch target {target} is out of range (±32MB word-offset)"));
            }
            let raw_offset = (word_offset as i32 as u32) & 0x00ff_ffff;
            let word = (cond_bits(*cond) << 28) | 0b101 << 25 | (*link as u32) << 24 | raw_offset;
            Ok(word)
        }
        ParsedInstr::Swi { cond, number } => {
            if *number > 0x00ff_ffff {
                return Err(format!("SWI number {number:#x} exceeds 24 bits"));
            }
            let word = (cond_bits(*cond) << 28) | 0b1111 << 24 | number;
            Ok(word)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodable_immediate_roundtrips_through_decode() {
        let (imm8, rotate) = try_encode_immediate(0xff000000).unwrap();
        let reconstructed = imm8.rotate_right(rotate * 2);
        assert_eq!(reconstructed, 0xff000000);
    }

    #[test]
    fn unencodable_immediate_is_rejected() {
        assert!(try_encode_immediate(0x0000_0101).is_none());
    }

    #[test]
    fn mov_instruction_encodes_expected_word() {
        let layout = crate::layout::run("MOV R0, #5\n");
        let (words, diags) = encode(&layout);
        assert!(diags.is_empty(), "{diags:?}");
        let decoded = arm_cpu::decode(words[0].1).unwrap();
        match decoded.kind {
            arm_cpu::Instruction::DataProcessing(dp) => {
                assert_eq!(dp.rd, 0);
                assert!(matches!(dp.op, arm_cpu::DataOp::Mov));
            }
            _ => panic!("expected data processing"),
        }
    }

    #[test]
    fn branch_round_trips_through_decode() {
        let source = "B target\nNOP_PAD: MOV R0, R0\ntarget: MOV R1, #1\n";
        let layout = crate::layout::run(source);
        let (words, diags) = encode(&layout);
        assert!(diags.is_empty(), "{diags:?}");
        let decoded = arm_cpu::decode(words[0].1).unwrap();
        assert!(matches!(decoded.kind, arm_cpu::Instruction::Branch { link: false, .. }));
    }
}
