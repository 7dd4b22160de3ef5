//! The barrel shifter: operand 2 of a data-processing instruction, plus its
//! carry-out (§4.2, §9 "Condition flags and the S-bit").

use crate::registers::Registers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftKind {
    pub fn decode(bits: u32) -> ShiftKind {
        match bits & 0b11 {
            0b00 => ShiftKind::Lsl,
            0b01 => ShiftKind::Lsr,
            0b10 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        }
    }
}

/// Result of evaluating the shifter: the 32-bit value and the carry bit it
/// produces, which feeds C when `S` is set on a logical data-processing
/// instruction.
#[derive(Debug, Clone, Copy)]
pub struct Shifted {
    pub value: u32,
    pub carry: bool,
}

fn shift_by(kind: ShiftKind, value: u32, amount: u32, carry_in: bool) -> Shifted {
    match kind {
        ShiftKind::Lsl => match amount {
            0 => Shifted { value, carry: carry_in },
            1..=31 => Shifted {
                value: value << amount,
                carry: (value >> (32 - amount)) & 1 != 0,
            },
            32 => Shifted {
                value: 0,
                carry: value & 1 != 0,
            },
            _ => Shifted { value: 0, carry: false },
        },
        ShiftKind::Lsr => match amount {
            0 => Shifted { value, carry: carry_in }, // encoded as LSR #32 by callers when explicit 0
            1..=31 => Shifted {
                value: value >> amount,
                carry: (value >> (amount - 1)) & 1 != 0,
            },
            32 => Shifted {
                value: 0,
                carry: value & (1 << 31) != 0,
            },
            _ => Shifted { value: 0, carry: false },
        },
        ShiftKind::Asr => {
            let signed = value as i32;
            match amount {
                0 => Shifted { value, carry: carry_in },
                1..=31 => Shifted {
                    value: (signed >> amount) as u32,
                    carry: (value >> (amount - 1)) & 1 != 0,
                },
                _ => {
                    let all_ones = signed < 0;
                    Shifted {
                        value: if all_ones { 0xffff_ffff } else { 0 },
                        carry: all_ones,
                    }
                }
            }
        }
        ShiftKind::Ror => {
            if amount == 0 {
                // Encoded as RRX: rotate right by 1 through the carry flag.
                let new_carry = value & 1 != 0;
                let result = (value >> 1) | ((carry_in as u32) << 31);
                Shifted { value: result, carry: new_carry }
            } else {
                let amount = amount % 32;
                if amount == 0 {
                    Shifted { value, carry: value & (1 << 31) != 0 }
                } else {
                    Shifted {
                        value: value.rotate_right(amount),
                        carry: (value >> (amount - 1)) & 1 != 0,
                    }
                }
            }
        }
    }
}

/// Operand 2 forms recognized by the decoder.
#[derive(Debug, Clone, Copy)]
pub enum Operand2 {
    /// `#imm ROR (rotate*2)`, the data-processing immediate form.
    RotatedImmediate { imm: u32, rotate: u32 },
    /// `Rm, <shift> #amount`
    ShiftByImmediate { rm: usize, kind: ShiftKind, amount: u32 },
    /// `Rm, <shift> Rs` — shift amount taken from the low byte of Rs.
    ShiftByRegister { rm: usize, kind: ShiftKind, rs: usize },
}

impl Operand2 {
    /// Decode the low 12 bits of a data-processing instruction word.
    pub fn decode(bits: u32, immediate: bool) -> Operand2 {
        if immediate {
            let rotate = (bits >> 8) & 0xf;
            let imm = bits & 0xff;
            Operand2::RotatedImmediate {
                imm,
                rotate: rotate * 2,
            }
        } else {
            let rm = (bits & 0xf) as usize;
            let kind = ShiftKind::decode(bits >> 5);
            if bits & 0b1_0000 != 0 {
                let rs = ((bits >> 8) & 0xf) as usize;
                Operand2::ShiftByRegister { rm, kind, rs }
            } else {
                let amount = (bits >> 7) & 0x1f;
                Operand2::ShiftByImmediate { rm, kind, amount }
            }
        }
    }

    pub fn eval(self, regs: &Registers, carry_in: bool) -> Shifted {
        match self {
            Operand2::RotatedImmediate { imm, rotate } => {
                if rotate == 0 {
                    Shifted { value: imm, carry: carry_in }
                } else {
                    Shifted {
                        value: imm.rotate_right(rotate),
                        carry: (imm.rotate_right(rotate) >> 31) & 1 != 0,
                    }
                }
            }
            Operand2::ShiftByImmediate { rm, kind, amount } => {
                let value = regs.operand(rm);
                let amount = if amount == 0 && matches!(kind, ShiftKind::Lsr | ShiftKind::Asr) {
                    32
                } else {
                    amount
                };
                shift_by(kind, value, amount, carry_in)
            }
            Operand2::ShiftByRegister { rm, kind, rs } => {
                let value = regs.operand(rm);
                let amount = regs.operand(rs) & 0xff;
                // A register-specified shift amount of 0 is a no-op for
                // every shift kind, including ROR — unlike the immediate
                // encoding, where `ROR #0` is `shift_by`'s RRX representation.
                // Only the immediate form ever means RRX (§9 barrel shifter).
                if amount == 0 {
                    Shifted { value, carry: carry_in }
                } else {
                    shift_by(kind, value, amount, carry_in)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsl_carry_out_is_last_bit_shifted_off() {
        let s = shift_by(ShiftKind::Lsl, 0x8000_0000, 1, false);
        assert_eq!(s.value, 0);
        assert!(s.carry);
    }

    #[test]
    fn rotated_immediate_zero_rotate_keeps_carry_in() {
        let op = Operand2::RotatedImmediate { imm: 0xff, rotate: 0 };
        let regs = Registers::default();
        let s = op.eval(&regs, true);
        assert_eq!(s.value, 0xff);
        assert!(s.carry);
    }

    #[test]
    fn ror_by_zero_is_rrx() {
        let s = shift_by(ShiftKind::Ror, 0b1, 0, true);
        assert_eq!(s.value, 0x8000_0000);
        assert!(s.carry);
    }

    #[test]
    fn register_shift_by_zero_is_a_no_op_not_rrx() {
        // Rs % 256 == 0 (a zero amount taken from a register) must leave
        // value and carry untouched for ROR, unlike the immediate encoding
        // where ROR #0 means RRX.
        let mut regs = Registers::default();
        regs.set(0, 0b1);
        regs.set(1, 0);
        let op = Operand2::ShiftByRegister { rm: 0, kind: ShiftKind::Ror, rs: 1 };
        let s = op.eval(&regs, true);
        assert_eq!(s.value, 0b1);
        assert!(s.carry);
    }
}
