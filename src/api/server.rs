//! HTTP server setup: router, CORS, and API routes.

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::launch;
use super::state::ApiState;

/// Build the application router.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/status", get(status));

    Router::new()
        .route("/verify", post(launch::verify))
        .route("/test", post(launch::test))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given address.
///
/// Returns a handle that resolves when the server shuts down. The caller
/// passes a `tokio::sync::watch::Receiver<bool>` for graceful shutdown.
pub async fn start_http_server(
    bind: SocketAddr,
    state: Arc<ApiState>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind = %listener.local_addr()?, "HTTP server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server stopped with an error");
        }
    });

    Ok(handle)
}

// -- API handlers --

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    let uptime = state.started_at.elapsed();
    Json(serde_json::json!({
        "status": "running",
        "pid": std::process::id(),
        "uptime_seconds": uptime.as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::testing::{ScriptedProcesses, Step};
    use crate::mcp::{Harness, LaunchOptions};
    use serde_json::{Value, json};
    use std::time::Duration;

    const READY: &str = "WebSocket connection established successfully\n";

    async fn serve(processes: ScriptedProcesses) -> String {
        let harness = Harness::new(Arc::new(processes)).with_options(LaunchOptions {
            timeout: Duration::from_millis(200),
            ..LaunchOptions::default()
        });
        let app = router(Arc::new(ApiState::new(harness)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{base}{path}"))
            .json(&body)
            .send()
            .await
            .expect("request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("json body"))
    }

    #[tokio::test]
    async fn verify_returns_connected_server() {
        let base = serve(
            ScriptedProcesses::default()
                .script("node", vec![Step::Stdout("Starting...\n"), Step::Stdout(READY)]),
        )
        .await;

        let (status, body) = post(
            &base,
            "/verify",
            json!({"config": {"mcpServers": {"fs": {"command": "node", "args": ["fs-server.js"]}}}}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["status"], "connected");
        assert_eq!(body["serverName"], "fs");
        assert_eq!(body["success"], true);
        let output = body["output"].as_str().unwrap();
        assert!(output.contains("Starting..."));
        assert!(output.contains("WebSocket connection established successfully"));
        assert!(body.get("errorOutput").is_none());
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn invalid_config_is_a_client_error() {
        let base = serve(ScriptedProcesses::default()).await;

        let (status, body) = post(
            &base,
            "/test",
            json!({"config": {"mcpServers": {"fs": {"command": "node", "args": "fs-server.js"}}}}),
        )
        .await;

        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");
        assert_eq!(
            body["message"],
            "Invalid configuration for server fs: missing command or args"
        );
        assert_eq!(body["details"]["kind"], "config");

        let (status, body) = post(&base, "/verify", json!({})).await;
        assert_eq!(status, 400);
        assert_eq!(body["message"], "Invalid configuration: missing mcpServers object");
    }

    #[tokio::test]
    async fn launch_failure_is_a_server_error() {
        let base = serve(ScriptedProcesses::default().script("node", vec![Step::Exit(Some(1))])).await;

        let (status, body) = post(
            &base,
            "/verify",
            json!({"config": {"mcpServers": {"fs": {"command": "node", "args": []}}}}),
        )
        .await;

        assert_eq!(status, 500);
        assert_eq!(body["status"], "error");
        assert_eq!(body["details"]["kind"], "exited_early");
        assert!(body["message"].as_str().unwrap().contains("No error output"));
    }

    #[tokio::test]
    async fn malformed_json_gets_error_body() {
        let base = serve(ScriptedProcesses::default()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/verify"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .expect("request");

        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.expect("json body");
        assert_eq!(body["status"], "error");
        assert_eq!(body["details"]["kind"], "bad_request");
    }

    #[tokio::test]
    async fn test_reports_every_server() {
        let base = serve(
            ScriptedProcesses::default()
                .script("good", vec![Step::Stdout(READY)])
                .script("slow", vec![Step::Stdout("loading\n")]),
        )
        .await;

        let (status, body) = post(
            &base,
            "/test",
            json!({"config": {"mcpServers": {
                "good": {"command": "good", "args": []},
                "slow": {"command": "slow", "args": []},
            }}}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Test completed");
        assert_eq!(body["results"]["good"]["status"], "success");
        assert_eq!(body["results"]["slow"]["status"], "error");
        assert_eq!(body["results"]["slow"]["details"]["kind"], "timed_out");
    }

    #[tokio::test]
    async fn health_and_status() {
        let base = serve(ScriptedProcesses::default()).await;

        let health: Value = reqwest::get(format!("{base}/api/health"))
            .await
            .expect("health")
            .json()
            .await
            .expect("json");
        assert_eq!(health["status"], "ok");

        let status: Value = reqwest::get(format!("{base}/api/status"))
            .await
            .expect("status")
            .json()
            .await
            .expect("json");
        assert_eq!(status["status"], "running");
        assert_eq!(status["pid"], std::process::id());
    }
}
