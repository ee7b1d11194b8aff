//! Runtime settings.
//!
//! Layered with the `config` crate, later sources winning:
//! 1. Built-in defaults
//! 2. Optional TOML settings file
//! 3. `MCP_TESTER_*` environment variables (e.g. `MCP_TESTER_LAUNCH_TIMEOUT_MS`)
//! 4. `PORT`, the conventional override for the listening port
//!
//! CLI flags are applied on top by the binary.

use crate::mcp::{BatchMode, DEFAULT_TIMEOUT_MS, LaunchOptions, READY_MARKER};

use anyhow::Context as _;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// Settings for the HTTP server and every launch it performs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Deadline for a server to print the marker.
    pub launch_timeout_ms: u64,
    /// Readiness marker.
    pub marker: String,
    pub batch_mode: BatchMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            launch_timeout_ms: DEFAULT_TIMEOUT_MS,
            marker: READY_MARKER.to_string(),
            batch_mode: BatchMode::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file, and the environment.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        Self::load_with_port(path, std::env::var("PORT").ok())
    }

    /// Same as [`Settings::load`] with `PORT` supplied by the caller.
    fn load_with_port(path: Option<&Path>, port: Option<String>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("launch_timeout_ms", DEFAULT_TIMEOUT_MS as i64)?
            .set_default("marker", READY_MARKER)?
            .set_default("batch_mode", "concurrent")?;

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(::config::Environment::with_prefix("MCP_TESTER").try_parsing(true));

        if let Some(port) = port {
            builder = builder.set_override("port", port)?;
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.launch_timeout_ms > 0, "launch_timeout_ms must be greater than zero");
        anyhow::ensure!(!self.marker.is_empty(), "marker must not be empty");
        Ok(())
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            timeout: Duration::from_millis(self.launch_timeout_ms),
            marker: self.marker.clone(),
        }
    }
}
