//! Mnemonic suffix grammar: `BASE{cond}{S}` for data-processing/multiply,
//! `BASE{cond}` for branches, `LDM`/`STM{cond}{addressing}` (in either
//! suffix order) for block transfer (§6).

use arm_cpu::Condition;

pub fn cond_bits(c: Condition) -> u32 {
    use Condition::*;
    match c {
        Eq => 0x0,
        Ne => 0x1,
        Cs => 0x2,
        Cc => 0x3,
        Mi => 0x4,
        Pl => 0x5,
        Vs => 0x6,
        Vc => 0x7,
        Hi => 0x8,
        Ls => 0x9,
        Ge => 0xa,
        Lt => 0xb,
        Gt => 0xc,
        Le => 0xd,
        Al => 0xe,
        Nv => 0xf,
    }
}

fn cond_from_str(s: &str) -> Option<Condition> {
    use Condition::*;
    Some(match s {
        "EQ" => Eq,
        "NE" => Ne,
        "CS" | "HS" => Cs,
        "CC" | "LO" => Cc,
        "MI" => Mi,
        "PL" => Pl,
        "VS" => Vs,
        "VC" => Vc,
        "HI" => Hi,
        "LS" => Ls,
        "GE" => Ge,
        "LT" => Lt,
        "GT" => Gt,
        "LE" => Le,
        "AL" => Al,
        _ => return None,
    })
}

/// (pre_increment, up) bits for a decoded `DataOp`/block-transfer base plus
/// its suffix, matching `arm_cpu::decode::BlockTransfer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrMode {
    pub pre_increment: bool,
    pub up: bool,
}

fn addr_mode_from_str(s: &str, is_load: bool) -> Option<AddrMode> {
    let (pre, up) = match (s, is_load) {
        ("IA", _) => (false, true),
        ("IB", _) => (true, true),
        ("DA", _) => (false, false),
        ("DB", _) => (true, false),
        ("FD", true) => (false, true),
        ("ED", true) => (true, true),
        ("FA", true) => (true, false),
        ("EA", true) => (false, false),
        ("FD", false) => (true, false),
        ("ED", false) => (false, false),
        ("FA", false) => (true, true),
        ("EA", false) => (false, true),
        _ => return None,
    };
    Some(AddrMode {
        pre_increment: pre,
        up,
    })
}

pub struct DataProcSuffix {
    pub base: &'static str,
    pub cond: Condition,
    pub set_flags: bool,
}

const DP_BASES: &[&str] = &[
    "AND", "EOR", "SUB", "RSB", "ADD", "ADC", "SBC", "RSC", "TST", "TEQ", "CMP", "CMN", "ORR",
    "MOV", "BIC", "MVN", "MUL", "MLA",
];

/// Strip a known base mnemonic from `raw`, then parse the remaining
/// `{cond}{S}` suffix. Tries longest-base-first so e.g. `"BL"` isn't
/// mistaken for `"B"` plus a garbage suffix elsewhere.
pub fn parse_data_proc_or_mul(raw: &str) -> Option<DataProcSuffix> {
    for &base in DP_BASES {
        if let Some(rest) = raw.strip_prefix(base) {
            if let Some((cond, set_flags)) = parse_cond_s_suffix(rest) {
                return Some(DataProcSuffix {
                    base,
                    cond,
                    set_flags,
                });
            }
        }
    }
    None
}

fn parse_cond_s_suffix(rest: &str) -> Option<(Condition, bool)> {
    match rest.len() {
        0 => Some((Condition::Al, false)),
        1 if rest == "S" => Some((Condition::Al, true)),
        2 => cond_from_str(rest).map(|c| (c, false)),
        3 if rest.ends_with('S') => cond_from_str(&rest[..2]).map(|c| (c, true)),
        _ => None,
    }
}

pub struct SingleTransferSuffix {
    pub load: bool,
    pub byte: bool,
    pub cond: Condition,
}

const XFER_BASES: &[(&str, bool, bool)] = &[
    ("LDRB", true, true),
    ("STRB", false, true),
    ("LDR", true, false),
    ("STR", false, false),
];

pub fn parse_single_transfer(raw: &str) -> Option<SingleTransferSuffix> {
    for &(base, load, byte) in XFER_BASES {
        if let Some(rest) = raw.strip_prefix(base) {
            let cond = if rest.is_empty() {
                Condition::Al
            } else if rest.len() == 2 {
                cond_from_str(rest)?
            } else {
                continue;
            };
            return Some(SingleTransferSuffix { load, byte, cond });
        }
    }
    None
}

pub struct BlockTransferSuffix {
    pub load: bool,
    pub cond: Condition,
    pub addr_mode: AddrMode,
}

pub fn parse_block_transfer(raw: &str) -> Option<BlockTransferSuffix> {
    let (base, load) = if let Some(rest) = raw.strip_prefix("LDM") {
        (rest, true)
    } else if let Some(rest) = raw.strip_prefix("STM") {
        (rest, false)
    } else {
        return None;
    };

    let (cond, addr_mode) = match base.len() {
        0 => (Condition::Al, AddrMode { pre_increment: false, up: true }), // default IA
        2 => {
            if let Some(am) = addr_mode_from_str(base, load) {
                (Condition::Al, am)
            } else {
                (cond_from_str(base)?, AddrMode { pre_increment: false, up: true })
            }
        }
        4 => {
            let (a, b) = base.split_at(2);
            if let (Some(c), Some(am)) = (cond_from_str(a), addr_mode_from_str(b, load)) {
                (c, am)
            } else {
                let (a, b) = base.split_at(2);
                (cond_from_str(b)?, addr_mode_from_str(a, load)?)
            }
        }
        _ => return None,
    };

    Some(BlockTransferSuffix {
        load,
        cond,
        addr_mode,
    })
}

pub fn parse_branch(raw: &str) -> Option<(bool, Condition)> {
    if let Some(rest) = raw.strip_prefix("BL") {
        let cond = if rest.is_empty() {
            Condition::Al
        } else {
            cond_from_str(rest)?
        };
        return Some((true, cond));
    }
    if let Some(rest) = raw.strip_prefix('B') {
        let cond = if rest.is_empty() {
            Condition::Al
        } else {
            cond_from_str(rest)?
        };
        return Some((false, cond));
    }
    None
}

pub fn parse_swi(raw: &str) -> Option<Condition> {
    for base in ["SWI", "SVC"] {
        if let Some(rest) = raw.strip_prefix(base) {
            return if rest.is_empty() { Some(Condition::Al) } else { cond_from_str(rest) };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mov_defaults_to_al_unset_flags() {
        let s = parse_data_proc_or_mul("MOV").unwrap();
        assert_eq!(s.base, "MOV");
        assert_eq!(s.cond, Condition::Al);
        assert!(!s.set_flags);
    }

    #[test]
    fn conditional_and_flag_setting_suffix() {
        let s = parse_data_proc_or_mul("ADDEQS").unwrap();
        assert_eq!(s.base, "ADD");
        assert_eq!(s.cond, Condition::Eq);
        assert!(s.set_flags);
    }

    #[test]
    fn bl_is_not_confused_with_b_plus_suffix() {
        let (link, cond) = parse_branch("BLNE").unwrap();
        assert!(link);
        assert_eq!(cond, Condition::Ne);
    }

    #[test]
    fn stmfd_aliases_to_stmdb() {
        let s = parse_block_transfer("STMFD").unwrap();
        assert!(!s.load);
        assert_eq!(s.addr_mode, AddrMode { pre_increment: true, up: false });
    }

    #[test]
    fn ldmfd_aliases_to_ldmia() {
        let s = parse_block_transfer("LDMFD").unwrap();
        assert!(s.load);
        assert_eq!(s.addr_mode, AddrMode { pre_increment: false, up: true });
    }
}
