//! Wire types for the control API (§4.10, §6): every request/response DTO
//! the router hands to/from `axum` handlers, documented for `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionCreatedResponse {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct CreateSessionRequest {
    /// Args passed to the hosted program's `GET_ARGUMENTS` syscall.
    #[serde(default)]
    pub args: Vec<String>,
    /// Env entries for `GET_ENVIRONMENT`, as `KEY=VALUE` pairs.
    #[serde(default)]
    pub env: Vec<String>,
    /// Overrides the daemon-wide PRNG seed for this session only.
    #[serde(default, rename = "rngSeed")]
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoadProgramRequest {
    pub source: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiagnosticDto {
    pub line: usize,
    pub column: usize,
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SourceMapEntryDto {
    pub address: u32,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoadProgramResponse {
    pub ok: bool,
    pub diagnostics: Vec<DiagnosticDto>,
    #[serde(rename = "entryPoint", skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<u32>,
    #[serde(rename = "sourceMap")]
    pub source_map: Vec<SourceMapEntryDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecStateResponse {
    pub state: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistersResponse {
    pub r: [u32; 16],
    pub pc: u32,
    pub cpsr: CpsrDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CpsrDto {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemoryQuery {
    pub addr: String,
    #[serde(default = "default_mem_len")]
    pub len: u32,
}

fn default_mem_len() -> u32 {
    64
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemoryResponse {
    pub addr: u32,
    /// Lowercase hex, two characters per byte, no separators.
    pub bytes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DisassemblyQuery {
    pub addr: String,
    #[serde(default = "default_disasm_count")]
    pub n: usize,
}

fn default_disasm_count() -> usize {
    16
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisassemblyEntry {
    pub addr: u32,
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisassemblyResponse {
    pub entries: Vec<DisassemblyEntry>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StackQuery {
    #[serde(default = "default_stack_words")]
    pub words: u32,
}

fn default_stack_words() -> u32 {
    16
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StackEntryDto {
    pub addr: u32,
    pub value: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StackResponse {
    pub entries: Vec<StackEntryDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddBreakpointRequest {
    pub addr: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub temporary: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BreakpointCreatedResponse {
    pub id: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BreakpointDto {
    pub id: u32,
    pub addr: u32,
    pub enabled: bool,
    pub condition: Option<String>,
    #[serde(rename = "hitCount")]
    pub hit_count: u32,
    pub temporary: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BreakpointListResponse {
    pub breakpoints: Vec<BreakpointDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddWatchpointRequest {
    pub addr: String,
    #[serde(default)]
    pub len: u32,
    pub kind: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WatchpointCreatedResponse {
    pub id: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WatchpointDto {
    pub id: u32,
    pub start: u32,
    pub end: u32,
    pub kind: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WatchpointListResponse {
    pub watchpoints: Vec<WatchpointDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    pub expression: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluateResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendStdinRequest {
    /// UTF-8 text; for binary stdin use `bytesHex` instead.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "bytesHex")]
    pub bytes_hex: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsoleResponse {
    pub console: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TracesResponse {
    pub memory: serde_json::Value,
    pub flags: serde_json::Value,
    pub stack: serde_json::Value,
    pub registers: serde_json::Value,
    pub coverage: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryDto {
    pub command: String,
    pub result: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntryDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<Uuid>,
    /// Comma-separated event kinds (§4.9's two filter dimensions).
    pub kinds: Option<String>,
}

/// Parses a hex (`0x...`) or decimal string into a `u32`, per §6 "Addresses
/// and values are carried as 32-bit unsigned integers in hex or decimal".
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex address '{s}': {e}"))
    } else {
        trimmed.parse::<u32>().map_err(|e| format!("invalid address '{s}': {e}"))
    }
}
