//! Shared state for the HTTP API.

use crate::mcp::Harness;

use std::time::Instant;

/// State shared across all API handlers.
pub struct ApiState {
    pub started_at: Instant,
    pub harness: Harness,
}

impl ApiState {
    pub fn new(harness: Harness) -> Self {
        Self {
            started_at: Instant::now(),
            harness,
        }
    }
}
