//! WeatherAPI.com current-conditions client.
//!
//! Makes one bounded request per call and classifies whatever comes back
//! into an `UpstreamOutcome`. Transport errors, status codes and body
//! problems never leave this module in raw form.
//! See: https://www.weatherapi.com/docs/

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::helpers::{mask_secret, truncate_preview};
use crate::services::location::SanitizedLocation;

/// Identifying User-Agent sent with every upstream request.
pub const WEATHER_PROXY_USER_AGENT: &str =
    concat!("WeatherProxy/", env!("CARGO_PKG_VERSION"));

/// Location queried by the `/test` smoke check.
pub const SMOKE_TEST_LOCATION: &str = "London";

/// WeatherAPI.com error code for "No location found matching parameter 'q'".
const WA_ERROR_NO_MATCHING_LOCATION: i64 = 1006;
/// WeatherAPI.com error code for "Parameter 'q' not provided".
const WA_ERROR_MISSING_QUERY: i64 = 1003;

/// Largest upstream body read into memory. A current.json body is a few KiB.
pub const MAX_UPSTREAM_BODY_BYTES: usize = 1024 * 1024;

/// Client for the WeatherAPI.com current-conditions endpoint.
#[derive(Clone)]
pub struct WeatherApiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for WeatherApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherApiClient")
            .field("url", &self.url)
            .field("api_key", &self.key_hint())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Classified result of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    Success(WeatherSnapshot),
    /// The upstream rejected the query itself; the reason is for logs only.
    InvalidInput(String),
    NotFound,
    UpstreamUnavailable,
    UpstreamError(u16),
    Timeout,
    MalformedUpstreamResponse,
}

impl UpstreamOutcome {
    /// Split into the snapshot or the error the handler responds with.
    pub fn into_result(self) -> Result<WeatherSnapshot, AppError> {
        match self {
            UpstreamOutcome::Success(snapshot) => Ok(snapshot),
            UpstreamOutcome::InvalidInput(_) | UpstreamOutcome::NotFound => {
                Err(AppError::LocationNotFound)
            }
            UpstreamOutcome::UpstreamUnavailable => Err(AppError::ServiceUnavailable),
            UpstreamOutcome::UpstreamError(code) => Err(AppError::UpstreamStatus(code)),
            UpstreamOutcome::Timeout => Err(AppError::UpstreamTimeout),
            UpstreamOutcome::MalformedUpstreamResponse => Err(AppError::InvalidUpstreamResponse),
        }
    }
}

/// Normalized weather for one location.
///
/// Deserializing from the upstream body keeps only the fields declared
/// here; everything else the provider sends is dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub location: LocationInfo,
    pub current: CurrentConditions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Latitude in decimal degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Longitude in decimal degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// IANA time zone (e.g. "Europe/London")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz_id: Option<String>,
    /// Local date and time at the location ("YYYY-MM-DD HH:MM")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localtime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Condition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feelslike_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feelslike_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Relative humidity percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<i64>,
    /// Pressure in millibars
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_mb: Option<f64>,
    /// Visibility in kilometres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vis_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_kph: Option<f64>,
    /// Compass direction (e.g. "WSW")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_degree: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv: Option<f64>,
    /// Cloud cover percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_mm: Option<f64>,
    /// Local time of the observation ("YYYY-MM-DD HH:MM")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Raw result of the `/test` smoke check.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SmokeTestReport {
    /// Location that was queried
    pub location: String,
    /// Upstream HTTP status, absent if the call never got a response
    pub status: Option<u16>,
    pub ok: bool,
    /// First characters of the raw upstream body
    pub preview: Option<String>,
    /// Transport failure description
    pub error: Option<String>,
}

// --- WeatherAPI.com JSON response types ---

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: Option<LocationInfo>,
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct WaErrorEnvelope {
    error: WaError,
}

#[derive(Debug, Deserialize)]
struct WaError {
    code: Option<i64>,
    message: Option<String>,
}

/// Reason a single attempt produced no HTTP response.
enum Transport {
    Unreachable(reqwest::Error),
    TimedOut,
    BodyTooLarge,
}

impl From<reqwest::Error> for Transport {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Transport::TimedOut
        } else {
            // The URL embeds the API key
            Transport::Unreachable(e.without_url())
        }
    }
}

impl WeatherApiClient {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(WEATHER_PROXY_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    /// Masked API key, safe to log.
    pub fn key_hint(&self) -> String {
        mask_secret(&self.api_key)
    }

    /// Fetch current conditions for a sanitized location.
    ///
    /// Exactly one attempt is made. No result is cached.
    pub async fn fetch_current(&self, location: &SanitizedLocation) -> UpstreamOutcome {
        let (status, body) = match self.get(location.as_str()).await {
            Ok(response) => response,
            Err(Transport::TimedOut) => {
                tracing::warn!(
                    location = %location,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "WeatherAPI request timed out"
                );
                return UpstreamOutcome::Timeout;
            }
            Err(Transport::Unreachable(e)) => {
                tracing::warn!(location = %location, "WeatherAPI unreachable: {}", e);
                return UpstreamOutcome::UpstreamUnavailable;
            }
            Err(Transport::BodyTooLarge) => {
                tracing::warn!(
                    location = %location,
                    max_bytes = MAX_UPSTREAM_BODY_BYTES,
                    "WeatherAPI response body too large"
                );
                return UpstreamOutcome::MalformedUpstreamResponse;
            }
        };

        let outcome = classify_response(status, &body);
        match &outcome {
            UpstreamOutcome::Success(_) => {
                tracing::debug!(location = %location, "WeatherAPI returned current conditions");
            }
            other => {
                tracing::warn!(
                    location = %location,
                    status = status.as_u16(),
                    outcome = ?other,
                    "WeatherAPI request did not succeed"
                );
            }
        }
        outcome
    }

    /// Run the fixed smoke-test query and report the raw result.
    pub async fn smoke_test(&self) -> SmokeTestReport {
        let location = SMOKE_TEST_LOCATION.to_string();
        match self.get(SMOKE_TEST_LOCATION).await {
            Ok((status, body)) => SmokeTestReport {
                location,
                status: Some(status.as_u16()),
                ok: status.is_success(),
                preview: Some(truncate_preview(&body)),
                error: None,
            },
            Err(Transport::TimedOut) => SmokeTestReport {
                location,
                status: None,
                ok: false,
                preview: None,
                error: Some(format!(
                    "request timed out after {} ms",
                    self.timeout.as_millis()
                )),
            },
            Err(Transport::Unreachable(e)) => SmokeTestReport {
                location,
                status: None,
                ok: false,
                preview: None,
                error: Some(e.to_string()),
            },
            Err(Transport::BodyTooLarge) => SmokeTestReport {
                location,
                status: None,
                ok: false,
                preview: None,
                error: Some(format!(
                    "response body exceeded {} bytes",
                    MAX_UPSTREAM_BODY_BYTES
                )),
            },
        }
    }

    /// Send the request and read the entire body under one deadline.
    ///
    /// Hitting the deadline drops the in-flight request, which closes its
    /// connection. Bodies over `MAX_UPSTREAM_BODY_BYTES` are abandoned the
    /// same way.
    async fn get(&self, q: &str) -> Result<(reqwest::StatusCode, String), Transport> {
        let call = async {
            let mut response = self
                .client
                .get(&self.url)
                .query(&[("key", self.api_key.as_str()), ("q", q), ("aqi", "no")])
                .send()
                .await?;
            let status = response.status();

            if response
                .content_length()
                .is_some_and(|len| len > MAX_UPSTREAM_BODY_BYTES as u64)
            {
                return Err(Transport::BodyTooLarge);
            }

            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > MAX_UPSTREAM_BODY_BYTES {
                    return Err(Transport::BodyTooLarge);
                }
                body.extend_from_slice(&chunk);
            }
            Ok::<_, Transport>((status, String::from_utf8_lossy(&body).into_owned()))
        };

        match tokio::time::timeout(self.timeout, call).await {
            Err(_elapsed) => Err(Transport::TimedOut),
            Ok(result) => result,
        }
    }
}

/// Classify a complete upstream response.
///
/// This is a pure function (no I/O), applied after the body has been read in full.
fn classify_response(status: reqwest::StatusCode, body: &str) -> UpstreamOutcome {
    if !status.is_success() {
        let embedded = serde_json::from_str::<WaErrorEnvelope>(body).ok();
        let code = embedded.as_ref().and_then(|e| e.error.code);

        // The upstream answers unresolvable locations with 400.
        if status == reqwest::StatusCode::BAD_REQUEST {
            if code == Some(WA_ERROR_MISSING_QUERY) {
                let reason = embedded
                    .and_then(|e| e.error.message)
                    .unwrap_or_else(|| "query rejected".to_string());
                return UpstreamOutcome::InvalidInput(reason);
            }
            return UpstreamOutcome::NotFound;
        }
        if code == Some(WA_ERROR_NO_MATCHING_LOCATION) {
            return UpstreamOutcome::NotFound;
        }
        return UpstreamOutcome::UpstreamError(status.as_u16());
    }

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return UpstreamOutcome::MalformedUpstreamResponse,
    };

    // The two sections must be named keys of a top-level object
    if !value.is_object() {
        return UpstreamOutcome::MalformedUpstreamResponse;
    }

    if value.get("error").is_some_and(|e| !e.is_null()) {
        return UpstreamOutcome::NotFound;
    }

    match serde_json::from_value::<WaResponse>(value) {
        Ok(WaResponse {
            location: Some(location),
            current: Some(current),
        }) => UpstreamOutcome::Success(WeatherSnapshot { location, current }),
        _ => UpstreamOutcome::MalformedUpstreamResponse,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const CURRENT_PATH: &str = "/v1/current.json";

    /// A full WeatherAPI.com current.json body, including fields the proxy drops.
    pub(crate) fn london_body() -> serde_json::Value {
        serde_json::json!({
            "location": {
                "name": "London",
                "region": "City of London, Greater London",
                "country": "United Kingdom",
                "lat": 51.52,
                "lon": -0.11,
                "tz_id": "Europe/London",
                "localtime_epoch": 1772352000,
                "localtime": "2026-03-01 08:00"
            },
            "current": {
                "last_updated_epoch": 1772351100,
                "last_updated": "2026-03-01 07:45",
                "temp_c": 6.2,
                "temp_f": 43.2,
                "is_day": 1,
                "condition": {
                    "text": "Partly cloudy",
                    "icon": "//cdn.weatherapi.com/weather/64x64/day/116.png",
                    "code": 1003
                },
                "wind_mph": 9.4,
                "wind_kph": 15.1,
                "wind_degree": 240,
                "wind_dir": "WSW",
                "pressure_mb": 1012.0,
                "pressure_in": 29.88,
                "precip_mm": 0.1,
                "precip_in": 0.0,
                "humidity": 81,
                "cloud": 50,
                "feelslike_c": 3.4,
                "feelslike_f": 38.1,
                "vis_km": 10.0,
                "vis_miles": 6.0,
                "uv": 1.0,
                "gust_mph": 13.2,
                "gust_kph": 21.3
            }
        })
    }

    pub(crate) fn not_found_body() -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": 1006,
                "message": "No matching location found."
            }
        })
    }

    fn client_for(server: &MockServer, timeout: Duration) -> WeatherApiClient {
        WeatherApiClient::new(
            &format!("{}{}", server.uri(), CURRENT_PATH),
            "test-key-1234",
            timeout,
        )
        .unwrap()
    }

    fn location(s: &str) -> SanitizedLocation {
        crate::services::location::validate_location(Some(s)).unwrap()
    }

    async fn outcome_for(template: ResponseTemplate) -> UpstreamOutcome {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .respond_with(template)
            .mount(&server)
            .await;

        client_for(&server, Duration::from_secs(5))
            .fetch_current(&location("London"))
            .await
    }

    #[tokio::test]
    async fn test_sends_key_location_aqi_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .and(query_param("key", "test-key-1234"))
            .and(query_param("q", "St. John's"))
            .and(query_param("aqi", "no"))
            .and(header("user-agent", WEATHER_PROXY_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server, Duration::from_secs(5))
            .fetch_current(&location("St. John's"))
            .await;

        assert!(matches!(outcome, UpstreamOutcome::Success(_)));
    }

    #[tokio::test]
    async fn test_success_copies_documented_fields_only() {
        let outcome = outcome_for(ResponseTemplate::new(200).set_body_json(london_body())).await;

        let snapshot = match outcome {
            UpstreamOutcome::Success(snapshot) => snapshot,
            other => panic!("expected success, got {:?}", other),
        };
        assert_eq!(snapshot.location.name.as_deref(), Some("London"));
        assert_eq!(snapshot.current.temp_c, Some(6.2));
        assert_eq!(
            snapshot.current.condition.as_ref().and_then(|c| c.text.as_deref()),
            Some("Partly cloudy")
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        let mut location_keys: Vec<&str> = json["location"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        location_keys.sort_unstable();
        assert_eq!(
            location_keys,
            ["country", "lat", "localtime", "lon", "name", "region", "tz_id"]
        );

        let mut current_keys: Vec<&str> = json["current"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        current_keys.sort_unstable();
        assert_eq!(
            current_keys,
            [
                "cloud",
                "condition",
                "feelslike_c",
                "feelslike_f",
                "humidity",
                "last_updated",
                "precip_mm",
                "pressure_mb",
                "temp_c",
                "temp_f",
                "uv",
                "vis_km",
                "wind_degree",
                "wind_dir",
                "wind_kph",
            ]
        );
        assert_eq!(json["current"]["condition"], serde_json::json!({"text": "Partly cloudy"}));

        // Integer readings keep their integer form
        assert_eq!(json["current"]["humidity"], 81);
        assert!(json["current"]["humidity"].is_i64());
        assert_eq!(json["current"]["cloud"], 50);
        assert_eq!(json["current"]["wind_degree"], 240);
        assert_eq!(json["current"]["temp_c"], 6.2);
        assert_eq!(json["location"]["lon"], -0.11);
    }

    #[tokio::test]
    async fn test_bad_request_is_not_found() {
        let outcome =
            outcome_for(ResponseTemplate::new(400).set_body_json(not_found_body())).await;
        assert_eq!(outcome, UpstreamOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_bad_request_without_body_is_not_found() {
        let outcome = outcome_for(ResponseTemplate::new(400)).await;
        assert_eq!(outcome, UpstreamOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_missing_query_error_is_invalid_input() {
        let body = serde_json::json!({
            "error": { "code": 1003, "message": "Parameter q is missing." }
        });
        let outcome = outcome_for(ResponseTemplate::new(400).set_body_json(body)).await;
        assert_eq!(
            outcome,
            UpstreamOutcome::InvalidInput("Parameter q is missing.".to_string())
        );
    }

    #[tokio::test]
    async fn test_embedded_error_with_success_status_is_not_found() {
        let outcome =
            outcome_for(ResponseTemplate::new(200).set_body_json(not_found_body())).await;
        assert_eq!(outcome, UpstreamOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_no_matching_location_code_is_not_found_for_any_status() {
        let outcome =
            outcome_for(ResponseTemplate::new(404).set_body_json(not_found_body())).await;
        assert_eq!(outcome, UpstreamOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_other_error_status_passes_through() {
        let body = serde_json::json!({
            "error": { "code": 2006, "message": "API key provided is invalid" }
        });
        let outcome = outcome_for(ResponseTemplate::new(401).set_body_json(body)).await;
        assert_eq!(outcome, UpstreamOutcome::UpstreamError(401));

        let outcome = outcome_for(ResponseTemplate::new(500).set_body_string("oops")).await;
        assert_eq!(outcome, UpstreamOutcome::UpstreamError(500));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let outcome =
            outcome_for(ResponseTemplate::new(200).set_body_string("<html>gateway</html>")).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);
    }

    #[tokio::test]
    async fn test_missing_sections_is_malformed() {
        let body = serde_json::json!({ "location": { "name": "London" } });
        let outcome = outcome_for(ResponseTemplate::new(200).set_body_json(body)).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);

        let body = serde_json::json!({ "location": null, "current": { "temp_c": 1.0 } });
        let outcome = outcome_for(ResponseTemplate::new(200).set_body_json(body)).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);
    }

    #[tokio::test]
    async fn test_array_body_is_malformed() {
        let body = london_body();
        let array = serde_json::json!([body["location"], body["current"]]);
        let outcome = outcome_for(ResponseTemplate::new(200).set_body_json(array)).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);

        let outcome = outcome_for(ResponseTemplate::new(200).set_body_string("42")).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);
    }

    #[tokio::test]
    async fn test_oversized_body_is_malformed() {
        let body = " ".repeat(MAX_UPSTREAM_BODY_BYTES + 1);
        let outcome = outcome_for(ResponseTemplate::new(200).set_body_string(body)).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);
    }

    #[tokio::test]
    async fn test_wrongly_typed_field_is_malformed() {
        let mut body = london_body();
        body["current"]["temp_c"] = serde_json::json!("warm");
        let outcome = outcome_for(ResponseTemplate::new(200).set_body_json(body)).await;
        assert_eq!(outcome, UpstreamOutcome::MalformedUpstreamResponse);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(london_body())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200));
        let started = std::time::Instant::now();
        let outcome = client.fetch_current(&location("London")).await;

        assert_eq!(outcome, UpstreamOutcome::Timeout);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "timeout should fire near the deadline, took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_timed_out_request_is_abandoned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .and(query_param("q", "Slowtown"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(london_body())
                    .set_delay(Duration::from_secs(5)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200));

        let outcome = client.fetch_current(&location("Slowtown")).await;
        assert_eq!(outcome, UpstreamOutcome::Timeout);
        // Only the one attempt reached the server; nothing retried it
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        // The same client is not stuck behind the abandoned request
        let started = std::time::Instant::now();
        let outcome = client.fetch_current(&location("London")).await;
        assert!(matches!(outcome, UpstreamOutcome::Success(_)));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "follow-up request took {:?}",
            started.elapsed()
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        // Bind then release a port so nothing is listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WeatherApiClient::new(
            &format!("http://{}{}", addr, CURRENT_PATH),
            "test-key-1234",
            Duration::from_secs(5),
        )
        .unwrap();

        let outcome = client.fetch_current(&location("London")).await;
        assert_eq!(outcome, UpstreamOutcome::UpstreamUnavailable);
    }

    #[tokio::test]
    async fn test_smoke_test_reports_status_and_preview() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_PATH))
            .and(query_param("q", SMOKE_TEST_LOCATION))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .mount(&server)
            .await;

        let report = client_for(&server, Duration::from_secs(5)).smoke_test().await;

        assert_eq!(report.status, Some(200));
        assert!(report.ok);
        let preview = report.preview.unwrap();
        assert!(preview.starts_with('{'));
        assert!(preview.chars().count() <= crate::helpers::PREVIEW_MAX_CHARS + 3);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WeatherApiClient::new(
            &format!("http://{}{}", addr, CURRENT_PATH),
            "super-secret-key",
            Duration::from_secs(5),
        )
        .unwrap();

        let report = client.smoke_test().await;
        assert!(!report.ok);
        assert!(!report.error.unwrap().contains("super-secret-key"));
        assert_eq!(client.key_hint(), "****-key");
    }

    #[test]
    fn test_outcome_into_app_error() {
        let to_status = |o: UpstreamOutcome| o.into_result().unwrap_err().status().as_u16();
        assert_eq!(to_status(UpstreamOutcome::NotFound), 404);
        assert_eq!(to_status(UpstreamOutcome::InvalidInput("x".into())), 404);
        assert_eq!(to_status(UpstreamOutcome::UpstreamUnavailable), 503);
        assert_eq!(to_status(UpstreamOutcome::Timeout), 504);
        assert_eq!(to_status(UpstreamOutcome::MalformedUpstreamResponse), 502);
        assert_eq!(to_status(UpstreamOutcome::UpstreamError(403)), 403);
    }
}
