//! Weather HTTP endpoint.
//!
//! - GET /weather?location=<string>
//!
//! Each request runs rate check, validation and the upstream call in that
//! order, stopping at the first failure.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::extractors::{ClientKey, LocationParam};
use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::location::validate_location;
use crate::services::rate_limiter::Admission;
use crate::services::weather_api::{CurrentConditions, LocationInfo};

/// Successful weather response.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherResponse {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    /// Time this response was produced (ISO 8601, UTC)
    pub timestamp: String,
}

/// Get current weather for a location.
///
/// The location is trimmed and must be 1-100 characters of letters, digits,
/// spaces and `-'.,()`. Requests are limited per client address.
#[utoipa::path(
    get,
    path = "/weather",
    tag = "Weather",
    params(
        ("location" = String, Query, description = "Place name, postcode or \"lat,lon\" (e.g. \"London\")"),
    ),
    responses(
        (status = 200, description = "Current conditions", body = WeatherResponse),
        (status = 400, description = "Invalid location", body = ErrorResponse),
        (status = 404, description = "Location not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse,
         headers(
             ("Retry-After" = u64, description = "Seconds until the client's window resets")
         )),
        (status = 500, description = "Server configuration error", body = ErrorResponse),
        (status = 502, description = "Invalid response from weather service", body = ErrorResponse),
        (status = 503, description = "Weather service unreachable", body = ErrorResponse),
        (status = 504, description = "Weather service timed out", body = ErrorResponse),
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    ClientKey(client_key): ClientKey,
    LocationParam(location): LocationParam,
) -> Response {
    match handle_weather(&state, location.as_deref(), &client_key).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => err.into_response_with_details(state.config.is_development()),
    }
}

/// Run the weather pipeline for one request.
pub(crate) async fn handle_weather(
    state: &AppState,
    raw_location: Option<&str>,
    client_key: &str,
) -> Result<WeatherResponse, AppError> {
    if let Admission::Denied { reset_at } = state.rate_limiter.admit(client_key) {
        tracing::warn!(client = %client_key, %reset_at, "Rate limit exceeded");
        return Err(AppError::RateLimited { reset_at });
    }

    let location = validate_location(raw_location).map_err(|rejection| {
        tracing::debug!(
            client = %client_key,
            reason = rejection.reason(),
            "Rejected location query"
        );
        rejection
    })?;

    let client = state.weather_client.as_ref().ok_or_else(|| {
        tracing::error!("Weather request rejected: WEATHER_API_KEY is not configured");
        AppError::NotConfigured
    })?;

    let snapshot = client.fetch_current(&location).await.into_result()?;

    Ok(WeatherResponse {
        location: snapshot.location,
        current: snapshot.current,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
