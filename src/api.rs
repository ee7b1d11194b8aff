//! HTTP API for the MCP tester.
//!
//! Exposes `POST /verify` and `POST /test` for the browser form, plus
//! health and status endpoints under `/api`.

mod launch;
mod server;
mod state;

pub use server::{router, start_http_server};
pub use state::ApiState;
