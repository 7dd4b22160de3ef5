use std::collections::VecDeque;

/// Per-session stdin queue for `READ_CHAR`/`READ_STRING`/`READ_INT` (§3, §4.3).
///
/// Ownership: the run worker only ever pops; `send_stdin` (driven by the
/// control API, §4.10) only ever pushes. The queue itself does no blocking —
/// callers that find it empty get `arm_cpu::SyscallOutcome::WaitForInput`
/// from [`crate::Syscalls`] and are responsible for parking the run worker
/// until bytes arrive (§5 "suspension points").
#[derive(Debug, Default)]
pub struct StdinQueue {
    bytes: VecDeque<u8>,
}

impl StdinQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.bytes.extend(data.iter().copied());
    }

    pub fn pop_byte(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    pub fn peek_line_ready(&self) -> bool {
        self.bytes.contains(&b'\n')
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Pop a full line (without the trailing `\n`), if one is buffered.
    pub fn pop_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        Some(line[..line.len() - 1].to_vec())
    }
}
