//! Readiness state machine for one launch.
//!
//! The watcher owns the output buffers of a launch and decides, event by
//! event, whether the launch has settled. It never touches the process; the
//! launcher feeds it events and acts on the outcome it returns.

use std::time::Duration;

/// Where a launch stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Succeeded,
    ExitedEarly { code: Option<i32> },
    TimedOut { after: Duration },
    SpawnFailed,
}

impl Outcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Which console stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Accumulates output for one launch and tracks its [`Outcome`].
#[derive(Debug)]
pub struct ReadinessWatcher {
    marker: String,
    stdout: String,
    stderr: String,
    outcome: Outcome,
}

impl ReadinessWatcher {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            stdout: String::new(),
            stderr: String::new(),
            outcome: Outcome::Pending,
        }
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Record a chunk of output. Returns true if this chunk settled the launch.
    ///
    /// Ignored once settled. The marker is searched in the stream's
    /// accumulated text, so a marker split across reads still matches.
    pub fn on_output(&mut self, stream: Stream, chunk: &str) -> bool {
        if self.outcome.is_settled() {
            return false;
        }

        let buffer = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };

        // Only the new chunk plus enough of the old tail to hold a split marker.
        let mut scan_from = buffer.len().saturating_sub(self.marker.len().saturating_sub(1));
        while !buffer.is_char_boundary(scan_from) {
            scan_from -= 1;
        }

        buffer.push_str(chunk);

        if buffer[scan_from..].contains(self.marker.as_str()) {
            self.outcome = Outcome::Succeeded;
            return true;
        }
        false
    }

    /// The process exited. Returns true if this settled the launch.
    pub fn on_exit(&mut self, code: Option<i32>) -> bool {
        self.settle(Outcome::ExitedEarly { code })
    }

    /// The deadline passed. Returns true if the caller must now kill the process.
    pub fn on_timeout(&mut self, after: Duration) -> bool {
        self.settle(Outcome::TimedOut { after })
    }

    /// The process could not be started.
    pub fn on_spawn_error(&mut self) -> bool {
        self.settle(Outcome::SpawnFailed)
    }

    /// Hand the accumulated buffers to the caller.
    pub fn into_output(self) -> (String, String) {
        (self.stdout, self.stderr)
    }

    fn settle(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_settled() {
            return false;
        }
        self.outcome = outcome;
        true
    }
}
