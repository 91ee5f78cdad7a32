use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::helpers::retry_after_secs;
use crate::services::location::LocationRejection;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable error category (e.g. "Invalid location")
    pub error: String,
    /// Human-readable explanation
    pub message: String,
    /// Internal detail, only present in development mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Rate limit exceeded until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Invalid location: {0}")]
    InvalidLocation(#[from] LocationRejection),

    #[error("Location not found")]
    LocationNotFound,

    #[error("Weather service unreachable")]
    ServiceUnavailable,

    #[error("Weather service timed out")]
    UpstreamTimeout,

    #[error("Weather service returned a malformed response")]
    InvalidUpstreamResponse,

    #[error("Weather service returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Weather API key is not configured")]
    NotConfigured,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidLocation(_) => StatusCode::BAD_REQUEST,
            AppError::LocationNotFound => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidUpstreamResponse => StatusCode::BAD_GATEWAY,
            // Pass upstream error statuses through; anything outside 4xx/5xx is an anomaly.
            AppError::UpstreamStatus(code) => match StatusCode::from_u16(*code) {
                Ok(s) if s.is_client_error() || s.is_server_error() => s,
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::NotConfigured | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AppError::RateLimited { .. } => "Rate limit exceeded",
            AppError::InvalidLocation(_) => "Invalid location",
            AppError::LocationNotFound => "Location not found",
            AppError::ServiceUnavailable => "Service unavailable",
            AppError::UpstreamTimeout => "Request timeout",
            AppError::InvalidUpstreamResponse => "Invalid response from weather service",
            AppError::UpstreamStatus(_) => "Weather API error",
            AppError::NotConfigured => "Server configuration error",
            AppError::Internal(_) => "Internal server error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::RateLimited { reset_at } => format!(
                "Too many requests. Please try again in {} seconds.",
                retry_after_secs(*reset_at, Utc::now())
            ),
            AppError::InvalidLocation(rejection) => rejection.to_string(),
            AppError::LocationNotFound => {
                "No weather data found for the requested location".to_string()
            }
            AppError::ServiceUnavailable => {
                "Unable to reach the weather service. Please try again later.".to_string()
            }
            AppError::UpstreamTimeout => {
                "The weather service took too long to respond".to_string()
            }
            AppError::InvalidUpstreamResponse => {
                "The weather service returned an unexpected response".to_string()
            }
            AppError::UpstreamStatus(code) => {
                format!("The weather service returned an error (status {})", code)
            }
            AppError::NotConfigured => "Weather service is not configured".to_string(),
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Build the HTTP response, optionally including internal detail.
    ///
    /// Only `Internal` carries detail; it is logged regardless and exposed
    /// to the caller only when `expose_details` is set (development mode).
    pub fn into_response_with_details(self, expose_details: bool) -> Response {
        let details = match &self {
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                expose_details.then(|| detail.clone())
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: self.title().to_string(),
            message: self.message(),
            details,
        };

        let mut response = (self.status(), axum::Json(body)).into_response();

        if let AppError::RateLimited { reset_at } = self {
            let secs = retry_after_secs(reset_at, Utc::now());
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with_details(false)
    }
}
