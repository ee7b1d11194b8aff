//! mcp-tester CLI entry point.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use mcp_tester::api::{ApiState, start_http_server};
use mcp_tester::config::Settings;
use mcp_tester::mcp::orchestrator::ErrorResponse;
use mcp_tester::mcp::{Harness, LaunchRequest};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mcp-tester", version, about = "Launch MCP servers and check that they come up")]
struct Cli {
    /// TOML settings file.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the verify/test HTTP API (default).
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Launch one server from a config file and wait for it to report ready.
    Verify {
        /// JSON file holding `{"mcpServers": ...}` or `{"config": ...}`.
        file: PathBuf,
        /// Server to launch. Defaults to the first one in the file.
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Launch every server from a config file and report each result.
    Test {
        file: PathBuf,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mcp_tester=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.settings.as_deref()).context("failed to load settings")?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            serve(settings).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            file,
            server,
            timeout_ms,
        } => {
            let mut request = read_request(&file, timeout_ms).await?;
            if server.is_some() {
                request.server_name = server;
            }
            let result = harness(&settings).verify(&request).await;
            print_outcome(result)
        }
        Command::Test { file, timeout_ms } => {
            let request = read_request(&file, timeout_ms).await?;
            let result = harness(&settings).test(&request).await;
            print_outcome(result)
        }
    }
}

fn harness(settings: &Settings) -> Harness {
    Harness::default()
        .with_options(settings.launch_options())
        .with_batch_mode(settings.batch_mode)
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let bind = settings.bind_addr()?;
    let state = Arc::new(ApiState::new(harness(&settings)));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = start_http_server(bind, state, shutdown_rx)
        .await
        .with_context(|| format!("failed to start HTTP server on {bind}"))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    shutdown_tx.send(true).ok();
    handle.await.context("HTTP server task failed")?;

    Ok(())
}

async fn read_request(path: &Path, timeout_ms: Option<u64>) -> anyhow::Result<LaunchRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;

    let mut request = LaunchRequest::from_document(document)
        .with_context(|| format!("invalid request in {}", path.display()))?;
    if timeout_ms.is_some() {
        request.timeout_ms = timeout_ms;
    }
    Ok(request)
}

fn print_outcome<T: Serialize>(
    result: Result<T, mcp_tester::error::HarnessError>,
) -> anyhow::Result<ExitCode> {
    let (body, code) = match result {
        Ok(response) => (serde_json::to_string_pretty(&response)?, ExitCode::SUCCESS),
        Err(error) => (
            serde_json::to_string_pretty(&ErrorResponse::from(&error))?,
            ExitCode::FAILURE,
        ),
    };
    println!("{body}");
    Ok(code)
}
