//! Verify and test requests.
//!
//! `verify` launches a single server; `test` launches every configured
//! server and reports each one separately. A failing server never affects
//! its siblings: launch errors are folded into that server's result.

use crate::error::{HarnessError, LaunchError};
use crate::mcp::launcher::{LaunchOptions, LaunchSuccess, launch};
use crate::mcp::process::{ProcessControl, SystemProcesses};
use crate::mcp::types::{LaunchRequest, WorkerSpec};
use crate::mcp::validate::validate;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How the servers of a `test` request are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Start every server at once and wait for all of them.
    #[default]
    Concurrent,
    /// Start each server only after the previous one settled.
    Sequential,
}

/// Successful `verify` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub status: &'static str,
    pub message: String,
    pub server_name: String,
    pub success: bool,
    #[serde(flatten)]
    pub launch: LaunchSuccess,
}

/// Outcome of one server in a `test` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerResult {
    #[serde(rename_all = "camelCase")]
    Success {
        success: bool,
        connection: &'static str,
        #[serde(flatten)]
        launch: LaunchSuccess,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        error: String,
        details: serde_json::Value,
        duration_ms: u64,
    },
}

impl WorkerResult {
    fn settled(result: Result<LaunchSuccess, LaunchError>, elapsed: Duration) -> Self {
        let duration_ms = elapsed.as_millis() as u64;
        match result {
            Ok(launch) => Self::Success {
                success: true,
                connection: "connected",
                launch,
                duration_ms,
            },
            Err(error) => Self::Error {
                error: error.to_string(),
                details: error.details(),
                duration_ms,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Per-server results of a `test` request, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult(Vec<(String, WorkerResult)>);

impl BatchResult {
    pub fn get(&self, name: &str) -> Option<&WorkerResult> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkerResult)> {
        self.0.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for BatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, result) in &self.0 {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

/// Successful `test` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResponse {
    pub status: &'static str,
    pub message: String,
    pub results: BatchResult,
}

/// Body sent back whenever a request fails as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&HarnessError> for ErrorResponse {
    fn from(error: &HarnessError) -> Self {
        Self {
            status: "error",
            message: error.to_string(),
            details: error.details(),
        }
    }
}

/// Runs verify and test requests against a process source.
#[derive(Clone)]
pub struct Harness {
    processes: Arc<dyn ProcessControl>,
    options: LaunchOptions,
    batch_mode: BatchMode,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(Arc::new(SystemProcesses))
    }
}

impl Harness {
    pub fn new(processes: Arc<dyn ProcessControl>) -> Self {
        Self {
            processes,
            options: LaunchOptions::default(),
            batch_mode: BatchMode::default(),
        }
    }

    pub fn with_options(mut self, options: LaunchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_batch_mode(mut self, batch_mode: BatchMode) -> Self {
        self.batch_mode = batch_mode;
        self
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Launch one server and report whether it came up.
    ///
    /// Picks `serverName` when given, otherwise the first server in the
    /// document.
    pub async fn verify(&self, request: &LaunchRequest) -> Result<VerifyResponse, HarnessError> {
        let config = validate(&request.config)?;
        let options = self.options_for(request)?;

        let (name, spec) = match &request.server_name {
            Some(name) => {
                let spec = config.get(name).ok_or_else(|| {
                    HarnessError::BadRequest(format!("Unknown server: {name}"))
                })?;
                (name.as_str(), spec)
            }
            None => config.first(),
        };

        tracing::info!(server = name, "verifying MCP server");
        let launch = launch(self.processes.as_ref(), name, spec, &options).await?;

        Ok(VerifyResponse {
            status: "connected",
            message: "Connection verified successfully".to_string(),
            server_name: name.to_string(),
            success: true,
            launch,
        })
    }

    /// Launch every configured server and collect a result for each.
    pub async fn test(&self, request: &LaunchRequest) -> Result<TestResponse, HarnessError> {
        let config = validate(&request.config)?;
        let options = self.options_for(request)?;

        tracing::info!(
            servers = config.len(),
            mode = ?self.batch_mode,
            "testing MCP servers"
        );

        let runs = config
            .iter()
            .map(|(name, spec)| self.spawn_run(name, spec, &options));

        let results = match self.batch_mode {
            BatchMode::Concurrent => futures::future::join_all(runs).await,
            BatchMode::Sequential => {
                let mut results = Vec::with_capacity(config.len());
                for run in runs {
                    results.push(run.await);
                }
                results
            }
        };

        let failed = results.iter().filter(|(_, result)| !result.is_success()).count();
        tracing::info!(servers = results.len(), failed, "test completed");

        Ok(TestResponse {
            status: "success",
            message: "Test completed".to_string(),
            results: BatchResult(results),
        })
    }

    /// Run one server's launch on its own task so a panic stays contained.
    ///
    /// The task starts when the returned future is first polled.
    fn spawn_run(
        &self,
        name: &str,
        spec: &WorkerSpec,
        options: &LaunchOptions,
    ) -> impl Future<Output = (String, WorkerResult)> + use<> {
        let processes = self.processes.clone();
        let name = name.to_string();
        let spec = spec.clone();
        let options = options.clone();

        async move {
            let started = Instant::now();
            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                launch(processes.as_ref(), &task_name, &spec, &options).await
            });

            let result = match handle.await {
                Ok(result) => WorkerResult::settled(result, started.elapsed()),
                Err(error) => WorkerResult::Error {
                    error: format!("Launch task failed: {error}"),
                    details: serde_json::json!({ "kind": "task_failed" }),
                    duration_ms: started.elapsed().as_millis() as u64,
                },
            };

            if let WorkerResult::Error { error, .. } = &result {
                tracing::warn!(server = %name, %error, "MCP server test failed");
            }

            (name, result)
        }
    }

    fn options_for(&self, request: &LaunchRequest) -> Result<LaunchOptions, HarnessError> {
        match request.timeout_ms {
            None => Ok(self.options.clone()),
            Some(0) => Err(HarnessError::BadRequest(
                "timeoutMs must be greater than zero".to_string(),
            )),
            Some(timeout_ms) => Ok(LaunchOptions {
                timeout: Duration::from_millis(timeout_ms),
                ..self.options.clone()
            }),
        }
    }
}
