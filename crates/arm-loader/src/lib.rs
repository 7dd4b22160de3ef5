//! Loader (§6 "Machine-code layout", "Memory map (default)"): maps the
//! default segment layout onto a fresh [`MemoryBus`] and writes an
//! [`arm_asm::AssembledProgram`]'s segments into it.

use arm_asm::AssembledProgram;
use arm_memory::{MemError, MemoryBus, Perms, Segment};

/// The default memory map (§6): code at 0x8000, data immediately above
/// code, stack above data, and an optional low-memory segment created on
/// demand when the program's origin sits below the code base.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMapConfig {
    pub code_base: u32,
    pub code_len: u32,
    pub data_base: u32,
    pub data_len: u32,
    pub stack_base: u32,
    pub stack_len: u32,
}

pub const DEFAULT_CODE_LEN: u32 = 0x1_0000;
pub const DEFAULT_DATA_LEN: u32 = 0x1_0000;
pub const DEFAULT_STACK_LEN: u32 = 0x2000;

impl Default for MemoryMapConfig {
    fn default() -> Self {
        let code_base = arm_asm::DEFAULT_CODE_BASE;
        let data_base = code_base + DEFAULT_CODE_LEN;
        let stack_base = data_base + DEFAULT_DATA_LEN;
        Self {
            code_base,
            code_len: DEFAULT_CODE_LEN,
            data_base,
            data_len: DEFAULT_DATA_LEN,
            stack_base,
            stack_len: DEFAULT_STACK_LEN,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to map {name} segment: {source}")]
    Mapping { name: &'static str, source: MemError },
    #[error("failed to place bytes at {addr:#010x}: {source}")]
    Placement { addr: u32, source: MemError },
}

#[derive(Debug, Clone, Copy)]
pub struct LoadedImage {
    pub entry_point: u32,
    pub stack_top: u32,
}

/// Map the default segments onto `mem` and write every byte range from
/// `program` into it. `mem` must not already carry segments that would
/// overlap the default map (callers reset by building a fresh bus).
pub fn load(mem: &mut MemoryBus, program: &AssembledProgram, config: &MemoryMapConfig) -> Result<LoadedImage, LoadError> {
    let lowest = program
        .segments
        .iter()
        .map(|s| s.address)
        .min()
        .unwrap_or(config.code_base);

    if lowest < config.code_base {
        let low_len = config.code_base - lowest;
        mem.add_segment(Segment::new("low", lowest, low_len, Perms::RWX))
            .map_err(|source| LoadError::Mapping { name: "low", source })?;
    }

    mem.add_segment(Segment::new("code", config.code_base, config.code_len, Perms::RWX))
        .map_err(|source| LoadError::Mapping { name: "code", source })?;
    mem.add_segment(Segment::new("data", config.data_base, config.data_len, Perms::RW))
        .map_err(|source| LoadError::Mapping { name: "data", source })?;
    mem.add_segment(Segment::new("stack", config.stack_base, config.stack_len, Perms::RW))
        .map_err(|source| LoadError::Mapping { name: "stack", source })?;

    for segment in &program.segments {
        mem.load_bytes(segment.address, &segment.bytes)
            .map_err(|source| LoadError::Placement { addr: segment.address, source })?;
    }

    tracing::info!(
        entry = format!("{:#010x}", program.entry_point),
        segments = program.segments.len(),
        "program loaded"
    );

    Ok(LoadedImage {
        entry_point: program.entry_point,
        stack_top: config.stack_base + config.stack_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_program_lands_at_expected_addresses() {
        let (program, diagnostics) = arm_asm::assemble("_start:\n    MOV R0, #1\n    SWI #0\n").unwrap();
        assert!(diagnostics.is_empty());
        let mut mem = MemoryBus::new();
        let config = MemoryMapConfig::default();
        let image = load(&mut mem, &program, &config).unwrap();
        assert_eq!(image.entry_point, config.code_base);
        assert_eq!(image.stack_top, config.stack_base + config.stack_len);
        let word = mem.fetch_word(config.code_base).unwrap();
        assert_eq!(word, 0xe3a00001); // MOV R0, #1, AL condition
    }

    #[test]
    fn origin_below_code_base_gets_a_low_segment() {
        let (program, diagnostics) = arm_asm::assemble(".org 0x1000\n_start:\n    SWI #0\n").unwrap();
        assert!(diagnostics.is_empty());
        let mut mem = MemoryBus::new();
        let config = MemoryMapConfig::default();
        let image = load(&mut mem, &program, &config).unwrap();
        assert_eq!(image.entry_point, 0x1000);
        assert!(mem.fetch_word(0x1000).is_ok());
    }
}
