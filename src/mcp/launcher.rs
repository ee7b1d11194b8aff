//! Worker launcher: start one MCP server and wait for it to report ready.
//!
//! A launch races the process's output and exit against a deadline in a
//! single `select!` loop. The [`ReadinessWatcher`] decides which event
//! settles the launch; once it has, nothing else is read and the process is
//! torn down.

use crate::error::LaunchError;
use crate::mcp::process::{OutputEvent, ProcessControl};
use crate::mcp::types::WorkerSpec;
use crate::mcp::watcher::{Outcome, ReadinessWatcher, Stream};
use crate::mcp::{DEFAULT_TIMEOUT_MS, READY_MARKER};

use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// How a launch is judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Deadline for the marker to appear.
    pub timeout: Duration,
    /// Text that signals readiness on stdout or stderr.
    pub marker: String,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            marker: READY_MARKER.to_string(),
        }
    }
}

/// Output captured up to the moment a server reported ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSuccess {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_output: Option<String>,
}

/// Launch `spec` and wait until it prints the marker, exits, or times out.
pub async fn launch(
    processes: &dyn ProcessControl,
    name: &str,
    spec: &WorkerSpec,
    options: &LaunchOptions,
) -> Result<LaunchSuccess, LaunchError> {
    let launch_id = Uuid::new_v4();
    let mut watcher = ReadinessWatcher::new(options.marker.as_str());

    tracing::info!(
        server = name,
        %launch_id,
        command = %spec.command_line(),
        timeout_ms = options.timeout.as_millis() as u64,
        "starting MCP server"
    );

    let mut process = match processes.spawn(spec) {
        Ok(process) => process,
        Err(source) => {
            watcher.on_spawn_error();
            tracing::warn!(server = name, %launch_id, error = %source, "failed to start MCP server");
            return Err(LaunchError::SpawnFailed { source });
        }
    };

    tracing::debug!(server = name, %launch_id, pid = ?process.id(), "MCP server spawned");

    let deadline = tokio::time::sleep(options.timeout);
    tokio::pin!(deadline);

    while !watcher.outcome().is_settled() {
        tokio::select! {
            event = process.next_event() => match event {
                Some(OutputEvent::Stdout(chunk)) => {
                    tracing::debug!(server = name, %launch_id, output = %chunk.trim_end(), "server output");
                    watcher.on_output(Stream::Stdout, &chunk);
                }
                Some(OutputEvent::Stderr(chunk)) => {
                    tracing::debug!(server = name, %launch_id, output = %chunk.trim_end(), "server error output");
                    watcher.on_output(Stream::Stderr, &chunk);
                }
                Some(OutputEvent::Exited(code)) => {
                    tracing::info!(server = name, %launch_id, exit_code = ?code, "MCP server exited");
                    watcher.on_exit(code);
                }
                None => {
                    watcher.on_exit(None);
                }
            },
            () = &mut deadline => {
                if watcher.on_timeout(options.timeout) {
                    tracing::warn!(server = name, %launch_id, "MCP server timed out, killing it");
                }
            }
        }
    }

    let outcome = watcher.outcome().clone();
    if !matches!(outcome, Outcome::ExitedEarly { .. }) {
        process.terminate().await;
    }
    drop(process);

    let (stdout, stderr) = watcher.into_output();
    match outcome {
        Outcome::Succeeded => {
            tracing::info!(server = name, %launch_id, "MCP server reported ready");
            Ok(LaunchSuccess {
                output: stdout,
                error_output: (!stderr.is_empty()).then_some(stderr),
            })
        }
        Outcome::TimedOut { after } => Err(LaunchError::TimedOut {
            timeout: after,
            stdout,
            stderr,
        }),
        // The loop only ends once settled and spawn errors return above,
        // so only an exit can land here.
        Outcome::ExitedEarly { code } => Err(LaunchError::ExitedEarly { code, stderr }),
        Outcome::Pending | Outcome::SpawnFailed => {
            Err(LaunchError::ExitedEarly { code: None, stderr })
        }
    }
}
