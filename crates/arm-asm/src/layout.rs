//! Pass 1 (§4.4): assign addresses to every label, instruction, data blob,
//! and literal pool in a single left-to-right walk. Because each `.ltorg`
//! (or the implicit end-of-program pool) is sized and placed the instant it
//! is reached, pool addresses never need the "recompute after all sizes are
//! known" adjustment the general two-pass design allows for — capacity is
//! always known at flush time in a single forward pass.

use crate::ast::{parse_instruction, ParsedInstr};
use crate::diagnostic::Diagnostic;
use crate::directive::{parse_directive, Directive};
use crate::encode::try_encode_immediate;
use crate::pool::LiteralPool;
use crate::symbol::SymbolTable;
use crate::token::{tokenize, Body};

pub const DEFAULT_CODE_BASE: u32 = 0x8000;

pub struct PlacedInstr {
    pub address: u32,
    pub line: usize,
    pub instr: ParsedInstr,
}

pub struct DataBlock {
    pub address: u32,
    pub bytes: Vec<u8>,
}

pub struct Layout {
    pub instructions: Vec<PlacedInstr>,
    pub data_blocks: Vec<DataBlock>,
    pub pools: Vec<LiteralPool>,
    pub symbols: SymbolTable,
    pub entry_point: u32,
    pub end_address: u32,
    pub diagnostics: Vec<Diagnostic>,
}

fn align_up(value: u32, align: u32) -> u32 {
    if align == 0 {
        return value;
    }
    (value + align - 1) / align * align
}

pub fn run(source: &str) -> Layout {
    let lines = tokenize(source);
    let mut cursor = DEFAULT_CODE_BASE;
    let mut emitted_any = false;
    let mut first_org: Option<u32> = None;
    let mut symbols = SymbolTable::new();
    let mut instructions = Vec::new();
    let mut data_blocks = Vec::new();
    let mut pools = Vec::new();
    let mut pending_literals: Vec<u32> = Vec::new();
    let mut diagnostics = Vec::new();

    let mut flush_pool = |cursor: &mut u32, pending: &mut Vec<u32>, pools: &mut Vec<LiteralPool>| {
        if pending.is_empty() {
            return;
        }
        let address = align_up(*cursor, 4);
        let pool = LiteralPool {
            address,
            values: std::mem::take(pending),
        };
        *cursor = address + pool.byte_len();
        pools.push(pool);
    };

    for parsed_line in &lines {
        if let Some(label) = &parsed_line.label {
            if let Err(msg) = symbols.define(label, cursor) {
                diagnostics.push(Diagnostic::error(parsed_line.line, msg));
            }
        }

        let Some(body) = &parsed_line.body else { continue };

        match body {
            Body::Directive { name, operands } => match parse_directive(name, operands) {
                Ok(Directive::Org(addr)) => {
                    if emitted_any {
                        diagnostics.push(Diagnostic::error(
                            parsed_line.line,
                            "'.org' may only appear before any emitted code or data",
                        ));
                    }
                    cursor = addr;
                    first_org.get_or_insert(addr);
                }
                Ok(Directive::Align(n)) => {
                    cursor = align_up(cursor, n);
                }
                Ok(Directive::Word(values)) => {
                    let mut bytes = Vec::with_capacity(values.len() * 4);
                    for v in values {
                        bytes.extend_from_slice(&(v as u32).to_le_bytes());
                    }
                    let len = bytes.len() as u32;
                    data_blocks.push(DataBlock { address: cursor, bytes });
                    cursor += len;
                    emitted_any = true;
                }
                Ok(Directive::Byte(values)) => {
                    let bytes: Vec<u8> = values.iter().map(|v| *v as u8).collect();
                    let len = bytes.len() as u32;
                    data_blocks.push(DataBlock { address: cursor, bytes });
                    cursor += len;
                    emitted_any = true;
                }
                Ok(Directive::Ascii { bytes }) => {
                    let len = bytes.len() as u32;
                    data_blocks.push(DataBlock { address: cursor, bytes });
                    cursor += len;
                    emitted_any = true;
                }
                Ok(Directive::Space { len, fill }) => {
                    data_blocks.push(DataBlock {
                        address: cursor,
                        bytes: vec![fill; len as usize],
                    });
                    cursor += len;
                    emitted_any = true;
                }
                Ok(Directive::Ltorg) => {
                    flush_pool(&mut cursor, &mut pending_literals, &mut pools);
                    emitted_any = true;
                }
                Err(msg) => diagnostics.push(Diagnostic::error(parsed_line.line, msg)),
            },
            Body::Instruction { mnemonic, operands } => {
                match parse_instruction(mnemonic, operands) {
                    Ok(ParsedInstr::LoadImmediatePseudo { cond, rd, value }) => {
                        let resolved = if try_encode_immediate(value).is_some() {
                            ParsedInstr::DataProcessing {
                                op: "MOV",
                                cond,
                                s: false,
                                rd,
                                rn: 0,
                                operand2: crate::operand::Operand2Spec::Imm(value),
                            }
                        } else if try_encode_immediate(!value).is_some() {
                            ParsedInstr::DataProcessing {
                                op: "MVN",
                                cond,
                                s: false,
                                rd,
                                rn: 0,
                                operand2: crate::operand::Operand2Spec::Imm(!value),
                            }
                        } else {
                            if !pending_literals.contains(&value) {
                                pending_literals.push(value);
                            }
                            ParsedInstr::LoadImmediatePseudo { cond, rd, value }
                        };
                        instructions.push(PlacedInstr {
                            address: cursor,
                            line: parsed_line.line,
                            instr: resolved,
                        });
                        cursor += 4;
                        emitted_any = true;
                    }
                    Ok(instr) => {
                        instructions.push(PlacedInstr {
                            address: cursor,
                            line: parsed_line.line,
                            instr,
                        });
                        cursor += 4;
                        emitted_any = true;
                    }
                    Err(msg) => diagnostics.push(Diagnostic::error(parsed_line.line, msg)),
                }
            }
        }
    }

    flush_pool(&mut cursor, &mut pending_literals, &mut pools);

    let entry_point = symbols
        .resolve("_start")
        .or(first_org)
        .unwrap_or(DEFAULT_CODE_BASE);

    Layout {
        instructions,
        data_blocks,
        pools,
        symbols,
        entry_point,
        end_address: cursor,
        diagnostics,
    }
}
