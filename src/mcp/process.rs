//! Process control for MCP server launches.
//!
//! The launcher only sees [`ProcessControl`] and [`WorkerProcess`]: start a
//! process, pull its output and exit as a stream of [`OutputEvent`]s, and
//! terminate it. [`SystemProcesses`] implements that on top of
//! `tokio::process`, running each server through the platform shell in its
//! own process group so the whole tree can be killed at once.

use crate::mcp::types::WorkerSpec;

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

const READ_BUFFER_BYTES: usize = 8 * 1024;

/// Something observable happened to a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
    /// Exit code, or `None` when the process was killed by a signal.
    Exited(Option<i32>),
}

/// A started process, owned by exactly one launch.
#[async_trait]
pub trait WorkerProcess: Send {
    /// OS process id, while the process is still running.
    fn id(&self) -> Option<u32>;

    /// Next event from the process. `Exited` is delivered only after both
    /// output streams have closed; `None` after that.
    async fn next_event(&mut self) -> Option<OutputEvent>;

    /// Forcibly stop the process and everything it started.
    async fn terminate(&mut self);
}

/// Starts worker processes.
pub trait ProcessControl: Send + Sync {
    fn spawn(&self, spec: &WorkerSpec) -> std::io::Result<Box<dyn WorkerProcess>>;
}

/// Real processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn spawn(&self, spec: &WorkerSpec) -> std::io::Result<Box<dyn WorkerProcess>> {
        let mut command = shell_command(&spec.command_line());
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .envs(&spec.env);

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        #[cfg(unix)]
        command.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
        }

        let mut child = command.spawn()?;

        let (event_tx, event_rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_output(stdout, event_tx.clone(), OutputEvent::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_output(stderr, event_tx, OutputEvent::Stderr));
        }

        Ok(Box::new(SystemProcess {
            child,
            output: event_rx,
            exited: false,
        }))
    }
}

#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}

struct SystemProcess {
    child: Child,
    output: mpsc::Receiver<OutputEvent>,
    exited: bool,
}

impl SystemProcess {
    #[cfg(unix)]
    fn kill_group(&self) {
        if let Some(pid) = self.child.id() {
            // The child leads its own group, so its pid is also the pgid.
            let pgid = nix::unistd::Pid::from_raw(pid as i32);
            if let Err(error) = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL) {
                tracing::debug!(pid, %error, "failed to signal process group");
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

#[async_trait]
impl WorkerProcess for SystemProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn next_event(&mut self) -> Option<OutputEvent> {
        if let Some(event) = self.output.recv().await {
            return Some(event);
        }

        if self.exited {
            return None;
        }

        let code = match self.child.wait().await {
            Ok(status) => status.code(),
            Err(error) => {
                tracing::warn!(%error, "failed to wait for MCP server process");
                None
            }
        };
        self.exited = true;
        Some(OutputEvent::Exited(code))
    }

    async fn terminate(&mut self) {
        self.kill_group();
        if let Err(error) = self.child.kill().await {
            tracing::debug!(%error, "MCP server process already gone");
        }
        self.exited = true;
    }
}

impl Drop for SystemProcess {
    fn drop(&mut self) {
        // kill_on_drop only reaches the shell, not what it started.
        if !self.exited {
            self.kill_group();
        }
    }
}

/// Forward a stream as decoded text chunks until it closes.
async fn pump_output<R>(
    mut reader: R,
    event_tx: mpsc::Sender<OutputEvent>,
    wrap: fn(String) -> OutputEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER_BYTES];
    let mut decoder = Utf8Chunks::default();

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => {
                let text = decoder.push(&buffer[..read]);
                if !text.is_empty() && event_tx.send(wrap(text)).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                tracing::debug!(%error, "MCP server output stream failed");
                break;
            }
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        let _ = event_tx.send(wrap(rest)).await;
    }
}

/// Decodes UTF-8 across read boundaries, holding back an unfinished
/// trailing sequence until the next read. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let complete = self.pending.len() - incomplete_tail(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.drain(..complete);
        text
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

/// Length of a trailing multi-byte sequence that still needs more bytes.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}
