use axum::handler::HandlerWithoutStateExt;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::errors::{AppError, ErrorResponse};
use crate::services::rate_limiter::RateLimitStore;
use crate::services::weather_api::WeatherApiClient;

mod extractors;
pub mod health;
pub mod weather;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) rate_limiter: Arc<dyn RateLimitStore>,
    /// `None` when no API key is configured; weather requests then fail with 500.
    pub(crate) weather_client: Option<WeatherApiClient>,
    pub(crate) started_at: Instant,
}

impl AppState {
    pub(crate) fn new(
        config: AppConfig,
        rate_limiter: Arc<dyn RateLimitStore>,
    ) -> Result<Self, reqwest::Error> {
        let weather_client = config
            .weather_api_key
            .as_deref()
            .map(|key| {
                WeatherApiClient::new(&config.weather_api_url, key, config.upstream_timeout)
            })
            .transpose()?;

        Ok(Self {
            config: Arc::new(config),
            rate_limiter,
            weather_client,
            started_at: Instant::now(),
        })
    }
}

/// Build the application router.
///
/// Unmatched paths fall through to the static front-end; panics anywhere
/// below the outermost layer become a generic 500.
pub(crate) fn router(state: AppState) -> Router {
    let expose_details = state.config.is_development();

    // Read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET])
        .allow_headers(AnyOrigin);

    let static_files =
        ServeDir::new(&state.config.static_dir).not_found_service(not_found.into_service());

    Router::new()
        .route("/weather", get(weather::get_weather))
        .route("/health", get(health::health_check))
        .route("/env", get(health::env_info))
        .route("/test", get(health::smoke_test))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", crate::ApiDoc::openapi()))
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(
            move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, expose_details),
        ))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            message: "The requested resource does not exist".to_string(),
            details: None,
        }),
    )
        .into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, expose_details: bool) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("request handler panicked: {}", detail))
        .into_response_with_details(expose_details)
}
