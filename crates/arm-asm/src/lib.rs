//! Two-pass ARMv2 assembler (§4.4, §4.5): tokenizer, layout (address
//! assignment + literal-pool planning), encoder, and a disassembler used by
//! the debug controller's inspection queries.

pub mod ast;
pub mod diagnostic;
pub mod directive;
pub mod disasm;
pub mod encode;
pub mod layout;
pub mod literal;
pub mod mnemonic;
pub mod operand;
pub mod pool;
pub mod symbol;
pub mod token;

pub use diagnostic::{Diagnostic, Severity};
pub use layout::DEFAULT_CODE_BASE;
pub use symbol::SymbolTable;

/// One resolved word or data byte range, ready for the loader to write into
/// a `MemoryBus` (§4 "Loader").
#[derive(Debug, Clone)]
pub struct AssembledSegment {
    pub address: u32,
    pub bytes: Vec<u8>,
}

/// `address → (source line, column)`, returned by `load_program` alongside
/// diagnostics (§4.10, §2 supplement "Source map").
#[derive(Debug, Clone, Copy)]
pub struct SourceMapEntry {
    pub address: u32,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct AssembledProgram {
    pub entry_point: u32,
    pub segments: Vec<AssembledSegment>,
    pub symbols: SymbolTable,
    pub source_map: Vec<SourceMapEntry>,
}

/// Assemble `source`. On success, returns the assembled program and any
/// warnings. On failure, returns the full list of errors collected in
/// source order — never a partially-loaded program (§7).
pub fn assemble(source: &str) -> Result<(AssembledProgram, Vec<Diagnostic>), Vec<Diagnostic>> {
    let layout = layout::run(source);
    let (words, encode_diagnostics) = encode::encode(&layout);

    let mut diagnostics = layout.diagnostics;
    diagnostics.extend(encode_diagnostics);
    diagnostics.sort_by_key(|d| d.line);

    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(diagnostics);
    }

    let mut segments = Vec::new();
    let mut source_map = Vec::new();
    for placed in &layout.instructions {
        let Some(&(_, word)) = words.iter().find(|(addr, _)| *addr == placed.address) else {
            continue;
        };
        segments.push(AssembledSegment {
            address: placed.address,
            bytes: word.to_le_bytes().to_vec(),
        });
        source_map.push(SourceMapEntry {
            address: placed.address,
            line: placed.line,
            column: 1,
        });
    }
    for block in &layout.data_blocks {
        segments.push(AssembledSegment {
            address: block.address,
            bytes: block.bytes.clone(),
        });
    }
    for pool in &layout.pools {
        let mut bytes = Vec::with_capacity(pool.values.len() * 4);
        for value in &pool.values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        segments.push(AssembledSegment {
            address: pool.address,
            bytes,
        });
    }
    segments.sort_by_key(|s| s.address);

    Ok((
        AssembledProgram {
            entry_point: layout.entry_point,
            segments,
            symbols: layout.symbols,
            source_map,
        },
        diagnostics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_program_assembles_with_no_diagnostics() {
        let source = "\
            _start:\n\
                MOV R0, #1\n\
                ADD R1, R0, R0\n\
                SWI #0\n\
        ";
        let (program, diagnostics) = assemble(source).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(program.entry_point, DEFAULT_CODE_BASE);
        assert_eq!(program.segments.len(), 3);
    }

    #[test]
    fn undefined_symbol_is_reported_without_partial_load() {
        let source = "B missing\n";
        let err = assemble(source).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err[0].is_error());
    }

    #[test]
    fn large_immediate_uses_a_literal_pool() {
        let source = "\
            _start:\n\
                LDR R0, =0x12345678\n\
                SWI #0\n\
            .ltorg\n\
        ";
        let (program, diagnostics) = assemble(source).unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        // entry instruction + SWI + one pool word = 3 segments.
        assert_eq!(program.segments.len(), 3);
    }

    #[test]
    fn unreachable_pool_is_an_error() {
        let mut source = String::from("_start:\n    LDR R0, =0x12345678\n");
        for _ in 0..1100 {
            source.push_str("    MOV R1, R1\n");
        }
        source.push_str(".ltorg\n");
        let err = assemble(&source).unwrap_err();
        assert!(err.iter().any(|d| d.message.contains("unreachable")));
    }
}
