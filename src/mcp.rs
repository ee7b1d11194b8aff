//! MCP server launch harness.
//!
//! Launches the servers named in an `mcpServers` document as subprocesses and
//! decides readiness by watching their console output for a marker line.
//! Unlike long-lived workers, every launch here is one spawn-to-settle cycle:
//! the process is started, observed until it succeeds, exits or times out,
//! and then torn down.

pub mod launcher;
pub mod orchestrator;
pub mod process;
pub mod types;
pub mod validate;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use launcher::{LaunchOptions, LaunchSuccess, launch};
pub use orchestrator::{
    BatchMode, BatchResult, ErrorResponse, Harness, TestResponse, VerifyResponse, WorkerResult,
};
pub use process::{OutputEvent, ProcessControl, SystemProcesses, WorkerProcess};
pub use types::{Configuration, LaunchRequest, WorkerSpec};
pub use validate::validate;
pub use watcher::{Outcome, ReadinessWatcher};

/// Line a worker prints once it has finished its internal setup.
pub const READY_MARKER: &str = "WebSocket connection established successfully";

/// Default deadline for a worker to print [`READY_MARKER`].
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
