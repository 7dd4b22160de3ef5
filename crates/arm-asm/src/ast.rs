//! Parsed instruction/directive representation, produced once per source
//! line and consumed by both passes (§4.4).

use crate::mnemonic;
use crate::operand::{self, IndexSpec, MemOperand, Operand2Spec, OffsetSpec};
use arm_cpu::Condition;

#[derive(Debug, Clone)]
pub enum ParsedInstr {
    DataProcessing {
        op: &'static str,
        cond: Condition,
        s: bool,
        rd: usize,
        rn: usize,
        operand2: Operand2Spec,
    },
    Multiply {
        accumulate: bool,
        cond: Condition,
        s: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    },
    SingleTransfer {
        load: bool,
        byte: bool,
        cond: Condition,
        rd: usize,
        mem: MemOperand,
    },
    /// `LDR Rd, =imm`: resolved to either a `MOV`/`MVN` immediate or a
    /// literal-pool load during layout, never encoded directly.
    LoadImmediatePseudo {
        cond: Condition,
        rd: usize,
        value: u32,
    },
    BlockTransfer {
        load: bool,
        cond: Condition,
        pre_increment: bool,
        up: bool,
        writeback: bool,
        rn: usize,
        register_list: u16,
    },
    Branch {
        link: bool,
        cond: Condition,
        target: String,
    },
    Swi {
        cond: Condition,
        number: u32,
    },
}

/// Parse one instruction line's mnemonic + operand tokens into a
/// [`ParsedInstr`]. Returns `Err(message)` on any malformed operand; the
/// caller attaches the source line number.
pub fn parse_instruction(mnemonic_raw: &str, operands: &[String]) -> Result<ParsedInstr, String> {
    // `LDR Rd, =value` pseudo-instruction takes priority over the plain
    // memory-operand form.
    if mnemonic_raw == "LDR" || mnemonic::parse_single_transfer(mnemonic_raw).is_some() {
        if let [rd_tok, value_tok] = operands {
            if let Some(lit) = value_tok.trim().strip_prefix('=') {
                let suffix = mnemonic::parse_single_transfer(mnemonic_raw)
                    .ok_or_else(|| format!("unknown mnemonic '{mnemonic_raw}'"))?;
                if !suffix.load || suffix.byte {
                    return Err("'=value' pseudo-operand is only valid on LDR".to_string());
                }
                let rd = operand::parse_register(rd_tok).ok_or_else(|| format!("invalid register '{rd_tok}'"))?;
                let value = crate::literal::parse_number(lit)
                    .ok_or_else(|| format!("invalid literal '{lit}'"))?;
                return Ok(ParsedInstr::LoadImmediatePseudo {
                    cond: suffix.cond,
                    rd,
                    value: value as u32,
                });
            }
        }
    }

    if let Some(suffix) = mnemonic::parse_single_transfer(mnemonic_raw) {
        let rd = operand::parse_register(operands.first().ok_or("missing destination register")?)
            .ok_or_else(|| "invalid destination register".to_string())?;
        let mem = parse_single_transfer_mem(&operands[1..])?;
        return Ok(ParsedInstr::SingleTransfer {
            load: suffix.load,
            byte: suffix.byte,
            cond: suffix.cond,
            rd,
            mem,
        });
    }

    if let Some(suffix) = mnemonic::parse_block_transfer(mnemonic_raw) {
        let rn_tok = operands.first().ok_or("missing base register")?;
        let (rn, writeback) = if let Some(stripped) = rn_tok.strip_suffix('!') {
            (operand::parse_register(stripped).ok_or("invalid base register")?, true)
        } else {
            (operand::parse_register(rn_tok).ok_or("invalid base register")?, false)
        };
        let list_tok = operands.get(1).ok_or("missing register list")?;
        let register_list = operand::parse_register_list(list_tok)?;
        return Ok(ParsedInstr::BlockTransfer {
            load: suffix.load,
            cond: suffix.cond,
            pre_increment: suffix.addr_mode.pre_increment,
            up: suffix.addr_mode.up,
            writeback,
            rn,
            register_list,
        });
    }

    if let Some((link, cond)) = mnemonic::parse_branch(mnemonic_raw) {
        let target = operands.first().ok_or("missing branch target")?.clone();
        return Ok(ParsedInstr::Branch { link, cond, target });
    }

    if let Some(cond) = mnemonic::parse_swi(mnemonic_raw) {
        let tok = operands.first().ok_or("missing SWI number")?;
        let number_tok = tok.trim().strip_prefix('#').unwrap_or(tok.trim());
        let number = crate::literal::parse_number(number_tok).ok_or("invalid SWI number")?;
        return Ok(ParsedInstr::Swi { cond, number: number as u32 });
    }

    if let Some(suffix) = mnemonic::parse_data_proc_or_mul(mnemonic_raw) {
        if suffix.base == "MUL" || suffix.base == "MLA" {
            return parse_multiply(&suffix, operands);
        }
        return parse_data_processing(&suffix, operands);
    }

    Err(format!("unrecognized mnemonic '{mnemonic_raw}'"))
}

fn parse_multiply(suffix: &mnemonic::DataProcSuffix, operands: &[String]) -> Result<ParsedInstr, String> {
    let accumulate = suffix.base == "MLA";
    let needed = if accumulate { 4 } else { 3 };
    if operands.len() != needed {
        return Err(format!("{} expects {needed} operands", suffix.base));
    }
    let reg = |tok: &str| operand::parse_register(tok).ok_or_else(|| format!("invalid register '{tok}'"));
    let rd = reg(&operands[0])?;
    let rm = reg(&operands[1])?;
    let rs = reg(&operands[2])?;
    let rn = if accumulate { reg(&operands[3])? } else { 0 };
    Ok(ParsedInstr::Multiply {
        accumulate,
        cond: suffix.cond,
        s: suffix.set_flags,
        rd,
        rn,
        rs,
        rm,
    })
}

fn parse_data_processing(suffix: &mnemonic::DataProcSuffix, operands: &[String]) -> Result<ParsedInstr, String> {
    let is_comparison = matches!(suffix.base, "TST" | "TEQ" | "CMP" | "CMN");
    let is_unary = matches!(suffix.base, "MOV" | "MVN");

    let reg = |tok: &str| operand::parse_register(tok).ok_or_else(|| format!("invalid register '{tok}'"));

    let (rd, rn, op2_tokens): (usize, usize, &[String]) = if is_comparison {
        let rn = reg(operands.first().ok_or("missing operand")?)?;
        (0, rn, &operands[1..])
    } else if is_unary {
        let rd = reg(operands.first().ok_or("missing destination register")?)?;
        (rd, 0, &operands[1..])
    } else {
        let rd = reg(operands.first().ok_or("missing destination register")?)?;
        let rn = reg(operands.get(1).ok_or("missing first source register")?)?;
        (rd, rn, &operands[2..])
    };

    let operand2 = operand::parse_operand2(op2_tokens)?;

    Ok(ParsedInstr::DataProcessing {
        op: suffix.base,
        cond: suffix.cond,
        s: suffix.set_flags,
        rd,
        rn,
        operand2,
    })
}

fn parse_single_transfer_mem(tokens: &[String]) -> Result<MemOperand, String> {
    match tokens {
        [bracket] => operand::parse_mem_operand(bracket),
        [bracket, post_offset] => {
            let base = operand::parse_mem_operand(bracket)?;
            let (up, offset) = parse_post_offset(post_offset)?;
            Ok(MemOperand {
                up,
                offset,
                index: IndexSpec::PostIndexed,
                ..base
            })
        }
        _ => Err(format!("expected 1 or 2 memory-operand tokens, got {}", tokens.len())),
    }
}

fn parse_post_offset(tok: &str) -> Result<(bool, OffsetSpec), String> {
    let tok = tok.trim();
    let (negative, tok) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, tok),
    };
    if let Some(imm) = tok.strip_prefix('#') {
        let value = crate::literal::parse_number(imm).ok_or_else(|| format!("invalid offset '{tok}'"))?;
        Ok((!negative, OffsetSpec::Imm(value.unsigned_abs() as u32)))
    } else {
        let rm = operand::parse_register(tok).ok_or_else(|| format!("invalid offset register '{tok}'"))?;
        Ok((!negative, OffsetSpec::Reg { rm, kind: arm_cpu::ShiftKind::Lsl, amount: 0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_immediate() {
        let instr = parse_instruction("MOV", &["R0".into(), "#5".into()]).unwrap();
        assert!(matches!(instr, ParsedInstr::DataProcessing { op: "MOV", rd: 0, operand2: Operand2Spec::Imm(5), .. }));
    }

    #[test]
    fn ldr_equals_pseudo() {
        let instr = parse_instruction("LDR", &["R0".into(), "=0xdeadbeef".into()]).unwrap();
        assert!(matches!(instr, ParsedInstr::LoadImmediatePseudo { rd: 0, value: 0xdeadbeef, .. }));
    }

    #[test]
    fn ldr_pre_indexed() {
        let instr = parse_instruction("LDR", &["R0".into(), "[R1, #4]!".into()]).unwrap();
        match instr {
            ParsedInstr::SingleTransfer { mem, .. } => assert_eq!(mem.index, IndexSpec::PreIndexed),
            _ => panic!("expected single transfer"),
        }
    }

    #[test]
    fn ldr_post_indexed() {
        let instr = parse_instruction("LDR", &["R0".into(), "[R1]".into(), "#4".into()]).unwrap();
        match instr {
            ParsedInstr::SingleTransfer { mem, .. } => {
                assert_eq!(mem.index, IndexSpec::PostIndexed);
                assert_eq!(mem.offset, OffsetSpec::Imm(4));
            }
            _ => panic!("expected single transfer"),
        }
    }

    #[test]
    fn stmfd_with_writeback() {
        let instr = parse_instruction("STMFD", &["SP!".into(), "{R0-R2,LR}".into()]).unwrap();
        assert!(matches!(instr, ParsedInstr::BlockTransfer { writeback: true, rn: 13, .. }));
    }

    #[test]
    fn branch_with_link() {
        let instr = parse_instruction("BL", &["my_func".into()]).unwrap();
        assert!(matches!(instr, ParsedInstr::Branch { link: true, .. }));
    }
}
