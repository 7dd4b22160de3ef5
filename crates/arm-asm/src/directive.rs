//! Assembler directives (§4.4, §6).

use crate::literal::{parse_number, parse_string_bytes};

#[derive(Debug, Clone)]
pub enum Directive {
    Org(u32),
    Align(u32),
    Word(Vec<i64>),
    Byte(Vec<i64>),
    Ascii { bytes: Vec<u8> },
    Space { len: u32, fill: u8 },
    Ltorg,
}

pub fn parse_directive(name: &str, operands: &[String]) -> Result<Directive, String> {
    match name {
        "ORG" => {
            let value = number_operand(operands, 0)?;
            Ok(Directive::Org(value as u32))
        }
        "ALIGN" | "BALIGN" => {
            let value = number_operand(operands, 0)?;
            Ok(Directive::Align(value as u32))
        }
        "WORD" => {
            let values = operands
                .iter()
                .map(|op| parse_number(op).ok_or_else(|| format!("invalid .word operand '{op}'")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Directive::Word(values))
        }
        "BYTE" => {
            let values = operands
                .iter()
                .map(|op| parse_number(op).ok_or_else(|| format!("invalid .byte operand '{op}'")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Directive::Byte(values))
        }
        "ASCII" | "ASCIZ" | "STRING" => {
            let text = operands.first().ok_or("missing string literal")?;
            let add_nul = name != "ASCII";
            let bytes = parse_string_bytes(text, add_nul).ok_or_else(|| format!("malformed string literal '{text}'"))?;
            Ok(Directive::Ascii { bytes })
        }
        "SPACE" | "SKIP" => {
            let len = number_operand(operands, 0)? as u32;
            let fill = operands
                .get(1)
                .map(|op| parse_number(op).ok_or_else(|| format!("invalid fill byte '{op}'")))
                .transpose()?
                .unwrap_or(0) as u8;
            Ok(Directive::Space { len, fill })
        }
        "LTORG" => Ok(Directive::Ltorg),
        other => Err(format!("unknown directive '.{}'", other.to_ascii_lowercase())),
    }
}

fn number_operand(operands: &[String], idx: usize) -> Result<i64, String> {
    let tok = operands.get(idx).ok_or("missing directive operand")?;
    parse_number(tok).ok_or_else(|| format!("invalid numeric operand '{tok}'"))
}
