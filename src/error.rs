//! Error types for the harness.
//!
//! Each layer has its own `thiserror` enum. `HarnessError` is what a request
//! handler sees; the top-level [`Error`] also carries startup failures.

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error("settings error: {0}")]
    Settings(#[from] ::config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Self::Harness(HarnessError::Config(error))
    }
}

impl From<LaunchError> for Error {
    fn from(error: LaunchError) -> Self {
        Self::Harness(HarnessError::Launch(error))
    }
}

/// A submitted configuration document is malformed or incomplete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: missing mcpServers object")]
    MissingServers,

    #[error("Invalid configuration: no servers defined")]
    NoServers,

    #[error("Invalid configuration for server {server}: missing command or args")]
    MissingCommandOrArgs { server: String },

    #[error("Invalid configuration for server {server}: args must be strings")]
    NonStringArg { server: String },

    #[error("Invalid configuration for server {server}: env must map names to strings")]
    InvalidEnv { server: String },

    #[error("Invalid configuration for server {server}: cwd must be a string")]
    InvalidCwd { server: String },
}

impl ConfigError {
    /// The worker the error is about, if it concerns a single entry.
    pub fn server(&self) -> Option<&str> {
        match self {
            Self::MissingServers | Self::NoServers => None,
            Self::MissingCommandOrArgs { server }
            | Self::NonStringArg { server }
            | Self::InvalidEnv { server }
            | Self::InvalidCwd { server } => Some(server),
        }
    }
}

/// Terminal failure of a single launch.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to start process: {source}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Process exited with code {} before WebSocket connection was established. Error: {}",
        display_code(.code),
        display_stderr(.stderr)
    )]
    ExitedEarly { code: Option<i32>, stderr: String },

    #[error(
        "Process timed out after {}ms. Last output: {stdout}\nError output: {stderr}",
        millis(.timeout)
    )]
    TimedOut {
        timeout: Duration,
        stdout: String,
        stderr: String,
    },
}

impl LaunchError {
    /// Stable machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::ExitedEarly { .. } => "exited_early",
            Self::TimedOut { .. } => "timed_out",
        }
    }

    /// Structured diagnostics for response bodies.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::SpawnFailed { source } => serde_json::json!({
                "kind": self.kind(),
                "osError": source.to_string(),
            }),
            Self::ExitedEarly { code, stderr } => serde_json::json!({
                "kind": self.kind(),
                "exitCode": code,
                "errorOutput": display_stderr(stderr),
            }),
            Self::TimedOut {
                timeout,
                stdout,
                stderr,
            } => serde_json::json!({
                "kind": self.kind(),
                "timeoutMs": timeout.as_millis() as u64,
                "output": stdout,
                "errorOutput": stderr,
            }),
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "null".to_string(), |code| code.to_string())
}

fn millis(timeout: &Duration) -> u128 {
    timeout.as_millis()
}

fn display_stderr(stderr: &str) -> &str {
    if stderr.is_empty() {
        "No error output"
    } else {
        stderr
    }
}

/// Anything that ends a verify or test request with an error response.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("{0}")]
    BadRequest(String),
}

impl HarnessError {
    /// Whether the caller sent something unusable, as opposed to a worker failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::BadRequest(_))
    }

    /// Structured diagnostics for the `details` field of an error response.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Config(error) => serde_json::json!({
                "kind": "config",
                "server": error.server(),
            }),
            Self::Launch(error) => error.details(),
            Self::BadRequest(_) => serde_json::json!({ "kind": "bad_request" }),
        }
    }
}
