// Weather Proxy v0.1
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod config;
mod errors;
mod helpers;
mod routes;
mod services;
mod shutdown;

use config::AppConfig;
use routes::AppState;
use services::rate_limiter::{spawn_sweeper, InMemoryRateLimiter, RateLimitStore};

/// OpenAPI document for the weather proxy.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Proxy",
        version = "0.1.0",
        description = "Current weather conditions by location. Validates the \
            location query, limits requests per client, calls WeatherAPI.com \
            with a bounded timeout and returns a simplified JSON payload.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Weather", description = "Current conditions by location"),
        (name = "Diagnostics", description = "Health and configuration checks"),
    ),
    paths(
        routes::weather::get_weather,
        routes::health::health_check,
        routes::health::env_info,
        routes::health::smoke_test,
    ),
    components(
        schemas(
            routes::weather::WeatherResponse,
            services::weather_api::LocationInfo,
            services::weather_api::CurrentConditions,
            services::weather_api::Condition,
            services::weather_api::SmokeTestReport,
            routes::health::HealthResponse,
            routes::health::EnvResponse,
            errors::ErrorResponse,
        )
    )
)]
pub(crate) struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    init_tracing();
    install_panic_hook();

    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(e) if is_missing_dotenv(&e) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    match config.weather_api_key.as_deref() {
        Some(key) => tracing::info!("Weather API key configured ({})", helpers::mask_secret(key)),
        None => tracing::warn!(
            "WEATHER_API_KEY is not set; /weather requests will fail with 500 until it is configured"
        ),
    }
    if config.trust_forwarded_for {
        tracing::info!("Trusting X-Forwarded-For for client identification");
    }

    // Rate limiter state lives for the whole process
    let rate_limiter: Arc<dyn RateLimitStore> = Arc::new(InMemoryRateLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window,
    ));
    spawn_sweeper(rate_limiter.clone(), config.rate_limit_window);
    tracing::info!(
        "Rate limit: {} requests per {}s per client",
        config.rate_limit_max,
        config.rate_limit_window.as_secs()
    );

    let port = config.port;
    let state = match AppState::new(config, rate_limiter) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };
    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Weather proxy listening on {}", addr);
    tracing::info!("Swagger UI available at http://localhost:{}/swagger-ui/", port);

    // ConnectInfo supplies the peer address used as the rate-limit key
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::shutdown_signal())
    .await;

    if let Err(e) = served {
        tracing::error!("Server terminated unexpectedly: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

/// No `.env` file is a normal deployment, not a failure.
fn is_missing_dotenv(e: &dotenvy::Error) -> bool {
    matches!(e, dotenvy::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}

/// Initialize tracing. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_proxy=debug,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Log panics through tracing before the default hook prints them.
///
/// Request-scoped panics are turned into 500s by the router; any other
/// panic still terminates the process.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("Panic: {}", info);
        default_hook(info);
    }));
}
