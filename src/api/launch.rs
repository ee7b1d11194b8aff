use super::state::ApiState;

use crate::error::HarnessError;
use crate::mcp::LaunchRequest;
use crate::mcp::orchestrator::{ErrorResponse, TestResponse, VerifyResponse};

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Error half of every launch endpoint: `{status: "error", message, details}`.
pub(super) struct ApiError(HarnessError);

impl From<HarnessError> for ApiError {
    fn from(error: HarnessError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(HarnessError::BadRequest(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub(super) async fn verify(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<LaunchRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(server = ?request.server_name, "received verify request");

    state.harness.verify(&request).await.map(Json).map_err(|error| {
        tracing::warn!(%error, "verification failed");
        ApiError::from(error)
    })
}

pub(super) async fn test(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<LaunchRequest>, JsonRejection>,
) -> Result<Json<TestResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!("received test request");

    state.harness.test(&request).await.map(Json).map_err(|error| {
        tracing::warn!(%error, "test failed");
        ApiError::from(error)
    })
}
