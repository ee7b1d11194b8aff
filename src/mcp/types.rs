//! Types for launch configuration and requests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Launch definition for a single MCP server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Command to execute, run through the platform shell.
    pub command: String,
    /// Arguments appended to the command, in order.
    pub args: Vec<String>,
    /// Extra environment variables for the subprocess.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Working directory. Inherits the harness's when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl WorkerSpec {
    pub fn new(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// The command line handed to the shell: command and args joined by spaces.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A validated `mcpServers` document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    servers: Vec<(String, WorkerSpec)>,
}

impl Configuration {
    /// Build from already-checked entries. Callers must supply at least one.
    pub(crate) fn from_entries(servers: Vec<(String, WorkerSpec)>) -> Self {
        debug_assert!(!servers.is_empty());
        Self { servers }
    }

    /// The entry that appears first in the document.
    pub fn first(&self) -> (&str, &WorkerSpec) {
        let (name, spec) = &self.servers[0];
        (name, spec)
    }

    /// Look up a server by exact name.
    pub fn get(&self, name: &str) -> Option<&WorkerSpec> {
        self.servers
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, spec)| spec)
    }

    /// Iterate over all servers in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkerSpec)> {
        self.servers.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false for a validated configuration.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Body of a `verify` or `test` request.
///
/// `config` stays an untyped JSON value so validation can report which
/// server entry is broken instead of a generic deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    #[serde(default)]
    pub config: serde_json::Value,
    /// Server to verify. Defaults to the first one in the document.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Overrides the configured launch timeout for this request.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl LaunchRequest {
    /// Accept either a full request body (`{"config": ...}`) or a bare
    /// `{"mcpServers": ...}` document, as found in MCP client config files.
    pub fn from_document(document: serde_json::Value) -> Result<Self, serde_json::Error> {
        if document.get("config").is_some() {
            serde_json::from_value(document)
        } else {
            Ok(Self {
                config: document,
                ..Self::default()
            })
        }
    }
}
