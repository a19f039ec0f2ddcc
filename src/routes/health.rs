//! Liveness probe (/health, /healthz)
//!
//! Always 200 while the process serves requests. The body reports which
//! store backs the service, so a dev-mode in-memory fallback is visible.

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub commit: &'static str,
    pub built_at: &'static str,
    pub timestamp: String,
    /// "development" or "production"
    pub mode: &'static str,
    /// Backing store kind ("mongodb" or "memory")
    pub store: &'static str,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        built_at: env!("BUILD_TIMESTAMP"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        store: state.service.store().kind(),
    }
}

pub fn health_check(state: &AppState) -> Response<BoxBody> {
    json_response(StatusCode::OK, &build_health_response(state))
}
