//! Table-driven decoder over the top bits of the instruction word (§4.2).

use crate::barrel::Operand2;
use crate::cpsr::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl DataOp {
    pub fn decode(bits: u32) -> DataOp {
        use DataOp::*;
        match bits & 0xf {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xa => Cmp,
            0xb => Cmn,
            0xc => Orr,
            0xd => Mov,
            0xe => Bic,
            _ => Mvn,
        }
    }

    /// Comparison ops set flags but write no destination register.
    pub fn is_comparison(self) -> bool {
        matches!(self, DataOp::Tst | DataOp::Teq | DataOp::Cmp | DataOp::Cmn)
    }

    /// Logical ops take their carry-out from the shifter; arithmetic ops
    /// take it from the ALU addition/subtraction (§9).
    pub fn is_logical(self) -> bool {
        matches!(
            self,
            DataOp::And
                | DataOp::Eor
                | DataOp::Tst
                | DataOp::Teq
                | DataOp::Orr
                | DataOp::Mov
                | DataOp::Bic
                | DataOp::Mvn
        )
    }

    /// Ops that only consume Rn (MOV/MVN ignore it).
    pub fn uses_rn(self) -> bool {
        !matches!(self, DataOp::Mov | DataOp::Mvn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetOrigin {
    Immediate(u32),
    Register { rm: usize, kind: crate::barrel::ShiftKind, amount: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Offset applied, base unchanged; `[Rn, #off]`.
    Offset,
    /// Offset applied, base written back; `[Rn, #off]!`.
    PreIndexed,
    /// Base used as-is, offset applied and written back after; `[Rn], #off`.
    PostIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleTransfer {
    pub load: bool,
    pub byte: bool,
    pub up: bool,
    pub rn: usize,
    pub rd: usize,
    pub offset: OffsetOrigin,
    pub index_mode: IndexMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTransfer {
    pub load: bool,
    pub pre_increment: bool,
    pub up: bool,
    pub writeback: bool,
    pub user_bank: bool,
    pub rn: usize,
    pub register_list: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataProcessing {
    pub op: DataOp,
    pub s: bool,
    pub rn: usize,
    pub rd: usize,
    pub operand2: Operand2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiply {
    pub accumulate: bool,
    pub s: bool,
    pub rd: usize,
    pub rn: usize,
    pub rs: usize,
    pub rm: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    DataProcessing(DataProcessing),
    Multiply(Multiply),
    SingleTransfer(SingleTransfer),
    BlockTransfer(BlockTransfer),
    /// Signed word offset relative to the pipelined PC; `link` set for BL.
    Branch { offset: i32, link: bool },
    Swi { number: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub cond: Condition,
    pub raw: u32,
    pub kind: Instruction,
}

/// Decode failure: the word does not match any supported ARMv2 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("undefined instruction word {0:#010x}")]
pub struct UndefinedInstruction(pub u32);

pub fn decode(word: u32) -> Result<DecodedInstruction, UndefinedInstruction> {
    let cond = Condition::decode(word >> 28);
    let top2 = (word >> 26) & 0b11;

    let kind = match top2 {
        0b00 => {
            let is_multiply = (word & 0x0fc0_00f0) == 0x0000_0090;
            if is_multiply {
                Instruction::Multiply(Multiply {
                    accumulate: word & (1 << 21) != 0,
                    s: word & (1 << 20) != 0,
                    rd: ((word >> 16) & 0xf) as usize,
                    rn: ((word >> 12) & 0xf) as usize,
                    rs: ((word >> 8) & 0xf) as usize,
                    rm: (word & 0xf) as usize,
                })
            } else {
                let immediate = word & (1 << 25) != 0;
                Instruction::DataProcessing(DataProcessing {
                    op: DataOp::decode(word >> 21),
                    s: word & (1 << 20) != 0,
                    rn: ((word >> 16) & 0xf) as usize,
                    rd: ((word >> 12) & 0xf) as usize,
                    operand2: Operand2::decode(word, immediate),
                })
            }
        }
        0b01 => {
            let immediate_offset = word & (1 << 25) == 0;
            let pre = word & (1 << 24) != 0;
            let up = word & (1 << 23) != 0;
            let byte = word & (1 << 22) != 0;
            let writeback = word & (1 << 21) != 0;
            let load = word & (1 << 20) != 0;
            let rn = ((word >> 16) & 0xf) as usize;
            let rd = ((word >> 12) & 0xf) as usize;
            let offset = if immediate_offset {
                OffsetOrigin::Immediate(word & 0xfff)
            } else {
                OffsetOrigin::Register {
                    rm: (word & 0xf) as usize,
                    kind: crate::barrel::ShiftKind::decode(word >> 5),
                    amount: (word >> 7) & 0x1f,
                }
            };
            let index_mode = if !pre {
                IndexMode::PostIndexed
            } else if writeback {
                IndexMode::PreIndexed
            } else {
                IndexMode::Offset
            };
            Instruction::SingleTransfer(SingleTransfer {
                load,
                byte,
                up,
                rn,
                rd,
                offset,
                index_mode,
            })
        }
        0b10 => {
            if word & (1 << 25) != 0 {
                let link = word & (1 << 24) != 0;
                let raw_offset = word & 0x00ff_ffff;
                // 24-bit signed word offset, sign-extended then scaled by 4.
                let signed = ((raw_offset << 8) as i32) >> 8;
                Instruction::Branch {
                    offset: signed * 4,
                    link,
                }
            } else {
                Instruction::BlockTransfer(BlockTransfer {
                    load: word & (1 << 20) != 0,
                    pre_increment: word & (1 << 24) != 0,
                    up: word & (1 << 23) != 0,
                    user_bank: word & (1 << 22) != 0,
                    writeback: word & (1 << 21) != 0,
                    rn: ((word >> 16) & 0xf) as usize,
                    register_list: (word & 0xffff) as u16,
                })
            }
        }
        _ => {
            if (word & 0x0f00_0000) == 0x0f00_0000 {
                Instruction::Swi {
                    number: word & 0x00ff_ffff,
                }
            } else {
                return Err(UndefinedInstruction(word));
            }
        }
    };

    Ok(DecodedInstruction { cond, raw: word, kind })
}
