//! Operand parsing: registers, shifted operand2, addressing offsets, and
//! register lists, shared by the layout and encode passes.

use crate::literal::parse_number;
use arm_cpu::ShiftKind;

pub fn parse_register(tok: &str) -> Option<usize> {
    let tok = tok.trim().to_ascii_uppercase();
    match tok.as_str() {
        "SP" => return Some(13),
        "LR" => return Some(14),
        "PC" => return Some(15),
        _ => {}
    }
    let digits = tok.strip_prefix('R')?;
    let n: usize = digits.parse().ok()?;
    (n < 16).then_some(n)
}

fn parse_shift_kind(tok: &str) -> Option<ShiftKind> {
    match tok.to_ascii_uppercase().as_str() {
        "LSL" => Some(ShiftKind::Lsl),
        "LSR" => Some(ShiftKind::Lsr),
        "ASR" => Some(ShiftKind::Asr),
        "ROR" => Some(ShiftKind::Ror),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand2Spec {
    Imm(u32),
    Reg(usize),
    RegShiftImm { rm: usize, kind: ShiftKind, amount: u32 },
    RegShiftReg { rm: usize, kind: ShiftKind, rs: usize },
    Rrx(usize),
}

/// Parse an `operand2` given the remaining top-level operand tokens after
/// `Rd`/`Rn` have been consumed (1 token: bare register/immediate; 2
/// tokens: register plus a shift spec).
pub fn parse_operand2(tokens: &[String]) -> Result<Operand2Spec, String> {
    match tokens {
        [single] => {
            let trimmed = single.trim();
            if let Some(imm) = trimmed.strip_prefix('#') {
                let value = parse_number(imm).ok_or_else(|| format!("invalid immediate '{trimmed}'"))?;
                Ok(Operand2Spec::Imm(value as u32))
            } else {
                let rm = parse_register(trimmed).ok_or_else(|| format!("invalid register '{trimmed}'"))?;
                Ok(Operand2Spec::Reg(rm))
            }
        }
        [reg_tok, shift_tok] => {
            let rm = parse_register(reg_tok).ok_or_else(|| format!("invalid register '{reg_tok}'"))?;
            parse_shift_spec(rm, shift_tok)
        }
        _ => Err(format!("expected 1 or 2 operand2 tokens, got {}", tokens.len())),
    }
}

fn parse_shift_spec(rm: usize, shift_tok: &str) -> Result<Operand2Spec, String> {
    let shift_tok = shift_tok.trim();
    if shift_tok.eq_ignore_ascii_case("RRX") {
        return Ok(Operand2Spec::Rrx(rm));
    }
    let (kind_tok, amount_tok) = shift_tok
        .split_once(char::is_whitespace)
        .ok_or_else(|| format!("malformed shift spec '{shift_tok}'"))?;
    let kind = parse_shift_kind(kind_tok).ok_or_else(|| format!("unknown shift kind '{kind_tok}'"))?;
    let amount_tok = amount_tok.trim();
    if let Some(imm) = amount_tok.strip_prefix('#') {
        let amount = parse_number(imm).ok_or_else(|| format!("invalid shift amount '{amount_tok}'"))?;
        Ok(Operand2Spec::RegShiftImm {
            rm,
            kind,
            amount: amount as u32,
        })
    } else {
        let rs = parse_register(amount_tok).ok_or_else(|| format!("invalid shift register '{amount_tok}'"))?;
        Ok(Operand2Spec::RegShiftReg { rm, kind, rs })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSpec {
    Imm(u32),
    Reg { rm: usize, kind: ShiftKind, amount: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSpec {
    Offset,
    PreIndexed,
    PostIndexed,
}

#[derive(Debug, Clone, Copy)]
pub struct MemOperand {
    pub rn: usize,
    pub up: bool,
    pub offset: OffsetSpec,
    pub index: IndexSpec,
}

/// Parse `[Rn]`, `[Rn, #off]`, `[Rn, #off]!`, `[Rn], #off`, and the
/// register-offset equivalents.
pub fn parse_mem_operand(tok: &str) -> Result<MemOperand, String> {
    let tok = tok.trim();
    if let Some(rest) = tok.strip_prefix('[') {
        if let Some(inner) = rest.strip_suffix(']') {
            // `[Rn]` or `[Rn, #off]` or `[Rn, #off]!` with `!` inside handled below
            let parts: Vec<&str> = inner.splitn(2, ',').map(str::trim).collect();
            let rn = parse_register(parts[0]).ok_or_else(|| format!("invalid base register '{}'", parts[0]))?;
            if parts.len() == 1 {
                return Ok(MemOperand {
                    rn,
                    up: true,
                    offset: OffsetSpec::Imm(0),
                    index: IndexSpec::Offset,
                });
            }
            let (up, offset) = parse_offset_token(parts[1])?;
            return Ok(MemOperand {
                rn,
                up,
                offset,
                index: IndexSpec::Offset,
            });
        }
        if let Some(inner) = rest.strip_suffix("]!") {
            let parts: Vec<&str> = inner.splitn(2, ',').map(str::trim).collect();
            let rn = parse_register(parts[0]).ok_or_else(|| format!("invalid base register '{}'", parts[0]))?;
            let (up, offset) = if parts.len() == 1 {
                (true, OffsetSpec::Imm(0))
            } else {
                parse_offset_token(parts[1])?
            };
            return Ok(MemOperand {
                rn,
                up,
                offset,
                index: IndexSpec::PreIndexed,
            });
        }
    }
    Err(format!("invalid memory operand '{tok}'"))
}

fn parse_offset_token(tok: &str) -> Result<(bool, OffsetSpec), String> {
    let tok = tok.trim();
    let (negative, tok) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, tok),
    };
    if let Some(imm) = tok.strip_prefix('#') {
        let value = parse_number(imm).ok_or_else(|| format!("invalid offset '{tok}'"))?;
        Ok((!negative, OffsetSpec::Imm(value.unsigned_abs() as u32)))
    } else if let Some((reg_tok, shift_tok)) = tok.split_once(',') {
        let rm = parse_register(reg_tok.trim()).ok_or_else(|| format!("invalid offset register '{reg_tok}'"))?;
        let (kind, amount) = parse_inline_shift(shift_tok.trim())?;
        Ok((!negative, OffsetSpec::Reg { rm, kind, amount }))
    } else {
        let rm = parse_register(tok).ok_or_else(|| format!("invalid offset register '{tok}'"))?;
        Ok((!negative, OffsetSpec::Reg { rm, kind: ShiftKind::Lsl, amount: 0 }))
    }
}

fn parse_inline_shift(tok: &str) -> Result<(ShiftKind, u32), String> {
    let (kind_tok, amount_tok) = tok
        .split_once(char::is_whitespace)
        .ok_or_else(|| format!("malformed shift '{tok}'"))?;
    let kind = parse_shift_kind(kind_tok).ok_or_else(|| format!("unknown shift kind '{kind_tok}'"))?;
    let amount = parse_number(amount_tok.trim().trim_start_matches('#'))
        .ok_or_else(|| format!("invalid shift amount '{amount_tok}'"))?;
    Ok((kind, amount as u32))
}

/// Parse `{R0,R1,R5-R7,LR}` into a 16-bit register bitmap.
pub fn parse_register_list(tok: &str) -> Result<u16, String> {
    let tok = tok.trim();
    let inner = tok
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| format!("register list must be braced: '{tok}'"))?;
    let mut mask: u16 = 0;
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            let lo = parse_register(lo.trim()).ok_or_else(|| format!("invalid register '{lo}'"))?;
            let hi = parse_register(hi.trim()).ok_or_else(|| format!("invalid register '{hi}'"))?;
            for r in lo..=hi {
                mask |= 1 << r;
            }
        } else {
            let r = parse_register(part).ok_or_else(|| format!("invalid register '{part}'"))?;
            mask |= 1 << r;
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_numbered_registers() {
        assert_eq!(parse_register("SP"), Some(13));
        assert_eq!(parse_register("lr"), Some(14));
        assert_eq!(parse_register("R9"), Some(9));
    }

    #[test]
    fn register_list_with_range_and_alias() {
        let mask = parse_register_list("{R0-R2, LR}").unwrap();
        assert_eq!(mask, 0b0100_0000_0000_0111);
    }

    #[test]
    fn pre_indexed_with_writeback() {
        let op = parse_mem_operand("[R1, #4]!").unwrap();
        assert_eq!(op.rn, 1);
        assert_eq!(op.index, IndexSpec::PreIndexed);
        assert_eq!(op.offset, OffsetSpec::Imm(4));
    }

    #[test]
    fn negative_offset_flips_up_bit() {
        let op = parse_mem_operand("[R1, #-4]").unwrap();
        assert!(!op.up);
        assert_eq!(op.offset, OffsetSpec::Imm(4));
    }
}
