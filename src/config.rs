use std::time::Duration;

/// Default upstream endpoint for current conditions.
pub const DEFAULT_WEATHER_API_URL: &str = "https://api.weatherapi.com/v1/current.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Deployment environment. Development mode exposes internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
        }
    }
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// WeatherAPI.com key. `None` when unset or empty.
    pub weather_api_key: Option<String>,
    pub weather_api_url: String,
    pub upstream_timeout: Duration,
    /// Maximum requests per client per window.
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Honour `X-Forwarded-For` when identifying clients. Only safe behind a trusted proxy.
    pub trust_forwarded_for: bool,
    pub environment: Environment,
    /// Directory holding the front-end assets.
    pub static_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let weather_api_key = lookup("WEATHER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let environment = match lookup("APP_ENV").as_deref().map(str::trim) {
            None | Some("") | Some("production") => Environment::Production,
            Some("development") | Some("dev") => Environment::Development,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "APP_ENV",
                    value: other.to_string(),
                    reason: "expected 'production' or 'development'",
                })
            }
        };

        Ok(Self {
            port: parse_var(&lookup, "PORT", 3000)?,
            weather_api_key,
            weather_api_url: lookup("WEATHER_API_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_API_URL.to_string()),
            upstream_timeout: Duration::from_secs(positive(
                &lookup,
                "WEATHER_API_TIMEOUT_SECS",
                10,
            )?),
            rate_limit_max: positive(&lookup, "RATE_LIMIT_MAX", 100u64)? as u32,
            rate_limit_window: Duration::from_secs(positive(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                3600,
            )?),
            trust_forwarded_for: parse_bool(&lookup, "TRUST_FORWARDED_FOR", false)?,
            environment,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "./public".to_string()),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value: raw,
            reason: "not a valid number",
        }),
    }
}

fn positive<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = parse_var(lookup, var, default)?;
    if value == 0 || value > u64::from(u32::MAX) {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be between 1 and 4294967295",
        });
    }
    Ok(value)
}

fn parse_bool<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value: raw,
                reason: "expected true or false",
            }),
        },
    }
}
