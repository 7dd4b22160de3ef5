//! Command history ring buffer (supplemental to §4.6): every debug
//! operation the controller executes is recorded here, bounded to a fixed
//! capacity so a long-running session does not grow this without limit —
//! the same queue-with-a-cap shape the control plane uses elsewhere for
//! command dispatch.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub command: String,
    pub result: String,
}

#[derive(Debug)]
pub struct CommandHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl CommandHistory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: VecDeque::new() }
    }

    pub fn push(&mut self, command: impl Into<String>, result: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry { command: command.into(), result: result.into() });
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entry_is_evicted_past_capacity() {
        let mut history = CommandHistory::new(2);
        history.push("step", "ok");
        history.push("continue", "ok");
        history.push("reset", "ok");
        let commands: Vec<_> = history.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["continue", "reset"]);
    }
}
