pub mod location;
pub mod rate_limiter;
pub mod weather_api;
