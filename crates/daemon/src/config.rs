//! Daemon-wide configuration (§1 expansion: "an `armd::config::DaemonConfig`
//! loaded via `DaemonConfig::from_env()`"), mirroring the teacher's
//! environment-variable configuration pattern.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Whether stdin delivered via `send_stdin` is consumed immediately or
/// buffered until a newline (§6 "a configurable stdin delivery mode (batch
/// or interactive)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    Batch,
    Interactive,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind_addr: SocketAddr,
    /// Root directory every session's syscall file I/O is sandboxed to
    /// (§4.3 "File I/O confined to a configurable root").
    pub fs_root: PathBuf,
    pub stdin_mode: StdinMode,
    /// Sessions idle longer than this are evicted (§4.8).
    pub session_idle_ttl: Duration,
    /// Per-subscriber bounded channel capacity on the broadcaster (§4.9).
    pub event_channel_capacity: usize,
    pub rng_seed: u64,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("ARMD_BIND")
            .unwrap_or_else(|_| "127.0.0.1:7878".to_string())
            .parse()?;
        let fs_root = std::env::var("ARMD_FS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("armd-sandbox"));
        let stdin_mode = match std::env::var("ARMD_STDIN_MODE").as_deref() {
            Ok("interactive") => StdinMode::Interactive,
            _ => StdinMode::Batch,
        };
        let session_idle_ttl = std::env::var("ARMD_SESSION_IDLE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30 * 60));
        let event_channel_capacity = std::env::var("ARMD_EVENT_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(256);
        let rng_seed = std::env::var("ARMD_RNG_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0x5eed_5eed);

        Ok(Self {
            bind_addr,
            fs_root,
            stdin_mode,
            session_idle_ttl,
            event_channel_capacity,
            rng_seed,
        })
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".parse().unwrap(),
            fs_root: std::env::temp_dir().join("armd-sandbox"),
            stdin_mode: StdinMode::Batch,
            session_idle_ttl: Duration::from_secs(30 * 60),
            event_channel_capacity: 256,
            rng_seed: 0x5eed_5eed,
        }
    }
}
