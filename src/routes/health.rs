//! Read-only diagnostics.
//!
//! - GET /health: process status and uptime
//! - GET /env: non-secret configuration flags
//! - GET /test: one fixed upstream call, reported raw

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::mask_secret;
use crate::services::weather_api::SmokeTestReport;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
    /// Service version
    pub version: String,
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// "production" or "development"
    pub environment: String,
    /// Whether an upstream API key is configured
    pub api_key_configured: bool,
}

/// Non-secret configuration flags.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnvResponse {
    pub environment: String,
    pub port: u16,
    pub api_key_configured: bool,
    /// Last 4 characters of the API key, masked
    pub api_key_hint: Option<String>,
    pub weather_api_url: String,
    pub upstream_timeout_secs: u64,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub trust_forwarded_for: bool,
}

/// Health check endpoint.
///
/// Does not contact the upstream; a missing API key is reported but still
/// answers 200 so the process is not restarted for a configuration problem.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Diagnostics",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        environment: state.config.environment.as_str().to_string(),
        api_key_configured: state.weather_client.is_some(),
    })
}

/// Report configuration flags without exposing secrets.
#[utoipa::path(
    get,
    path = "/env",
    tag = "Diagnostics",
    responses(
        (status = 200, description = "Configuration flags", body = EnvResponse),
    )
)]
pub async fn env_info(State(state): State<AppState>) -> Json<EnvResponse> {
    let config = &state.config;
    Json(EnvResponse {
        environment: config.environment.as_str().to_string(),
        port: config.port,
        api_key_configured: config.weather_api_key.is_some(),
        api_key_hint: config.weather_api_key.as_deref().map(mask_secret),
        weather_api_url: config.weather_api_url.clone(),
        upstream_timeout_secs: config.upstream_timeout.as_secs(),
        rate_limit_max: config.rate_limit_max,
        rate_limit_window_secs: config.rate_limit_window.as_secs(),
        trust_forwarded_for: config.trust_forwarded_for,
    })
}

/// Call the upstream once for a fixed location and report the raw outcome.
///
/// Not rate limited. The report always answers 200 when a key is configured,
/// even if the upstream call itself failed.
#[utoipa::path(
    get,
    path = "/test",
    tag = "Diagnostics",
    responses(
        (status = 200, description = "Smoke test result", body = SmokeTestReport),
        (status = 500, description = "Server configuration error", body = ErrorResponse),
    )
)]
pub async fn smoke_test(State(state): State<AppState>) -> Result<Json<SmokeTestReport>, AppError> {
    let client = state.weather_client.as_ref().ok_or(AppError::NotConfigured)?;
    let report = client.smoke_test().await;
    tracing::info!(
        status = ?report.status,
        ok = report.ok,
        "Upstream smoke test finished"
    );
    Ok(Json(report))
}
