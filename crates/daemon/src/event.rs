//! Event envelopes published by sessions onto the [`crate::broadcaster::Broadcaster`]
//! (§4.9): console output, VM state transitions, stdin requests, breakpoint
//! and watchpoint hits, execution errors, and an optional rate-limited
//! instruction-retired tick. Every variant carries enough to reconstruct
//! the envelope `{ type, sessionId, data }` from §6.

use serde::Serialize;
use uuid::Uuid;

/// One event kind per row of the §4.9 "Event kinds include" list, plus the
/// `LogLine` kind the ambient tracing layer feeds in (§1 expansion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Console,
    State,
    StdinRequest,
    BreakpointHit,
    WatchpointHit,
    ExecutionError,
    InstructionRetired,
    LogLine,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Console => "console",
            EventKind::State => "state",
            EventKind::StdinRequest => "stdin_request",
            EventKind::BreakpointHit => "breakpoint_hit",
            EventKind::WatchpointHit => "watchpoint_hit",
            EventKind::ExecutionError => "execution_error",
            EventKind::InstructionRetired => "instruction_retired",
            EventKind::LogLine => "log_line",
        }
    }

    pub fn parse(s: &str) -> Option<EventKind> {
        Some(match s {
            "console" => EventKind::Console,
            "state" => EventKind::State,
            "stdin_request" => EventKind::StdinRequest,
            "breakpoint_hit" => EventKind::BreakpointHit,
            "watchpoint_hit" => EventKind::WatchpointHit,
            "execution_error" => EventKind::ExecutionError,
            "instruction_retired" => EventKind::InstructionRetired,
            "log_line" => EventKind::LogLine,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventData {
    Console {
        text: String,
    },
    State {
        from: String,
        to: String,
    },
    StdinRequest,
    BreakpointHit {
        #[serde(rename = "breakpointId")]
        breakpoint_id: u32,
        pc: u32,
    },
    WatchpointHit {
        #[serde(rename = "watchpointId")]
        watchpoint_id: u32,
        addr: u32,
        kind: String,
        #[serde(rename = "oldValue")]
        old_value: u32,
        #[serde(rename = "newValue")]
        new_value: u32,
    },
    ExecutionError {
        fault: String,
        pc: u32,
    },
    InstructionRetired {
        pc: u32,
    },
    LogLine {
        level: String,
        target: String,
        message: String,
    },
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::Console { .. } => EventKind::Console,
            EventData::State { .. } => EventKind::State,
            EventData::StdinRequest => EventKind::StdinRequest,
            EventData::BreakpointHit { .. } => EventKind::BreakpointHit,
            EventData::WatchpointHit { .. } => EventKind::WatchpointHit,
            EventData::ExecutionError { .. } => EventKind::ExecutionError,
            EventData::InstructionRetired { .. } => EventKind::InstructionRetired,
            EventData::LogLine { .. } => EventKind::LogLine,
        }
    }
}

/// Wire envelope: `type`, `sessionId`, `data` (§6 "Event envelopes").
/// `session_id` is `None` for daemon-wide events (currently only `LogLine`
/// entries emitted outside any session's run loop).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "sessionId")]
    pub session_id: Option<Uuid>,
    pub data: EventData,
    pub ts: i64,
}

impl Event {
    pub fn new(session_id: Option<Uuid>, data: EventData, ts: i64) -> Self {
        Self {
            kind: data.kind().as_str(),
            session_id,
            data,
            ts,
        }
    }
}
