//! mcp-tester: launch MCP servers from an `mcpServers` document and check
//! that they come up.
//!
//! A server counts as ready once it prints
//! `WebSocket connection established successfully` on stdout or stderr
//! within the launch timeout.

pub mod api;
pub mod config;
pub mod error;
pub mod mcp;

pub use error::{Error, Result};
