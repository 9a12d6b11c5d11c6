//! HTTP surface: run submission over SSE plus the results API.

pub mod api;
pub mod server;
pub mod sse;

pub use api::{ApiError, AppState, SharedState};
pub use server::{ServerConfig, build_router, start_server};
