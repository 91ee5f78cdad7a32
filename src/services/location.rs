//! Location query validation.
//!
//! A location string comes straight from the browser, so it is trimmed and
//! checked against a small allow-list before it is ever forwarded upstream.

use std::fmt;

/// Maximum length of a location after trimming, in characters.
pub const MAX_LOCATION_LEN: usize = 100;

/// A trimmed, allow-listed location string that is safe to forward upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedLocation(String);

impl SanitizedLocation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a location query was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationRejection {
    #[error("Location parameter is required")]
    Required,

    #[error("Location cannot be empty")]
    Empty,

    #[error("Location is too long (maximum {MAX_LOCATION_LEN} characters)")]
    TooLong,

    #[error("Location contains invalid characters")]
    InvalidCharacters,
}

impl LocationRejection {
    /// Short machine-readable reason, used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            LocationRejection::Required => "required",
            LocationRejection::Empty => "empty",
            LocationRejection::TooLong => "too long",
            LocationRejection::InvalidCharacters => "invalid characters",
        }
    }
}

/// Letters, digits, space, hyphen, apostrophe, period, comma and parentheses.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '.' | ',' | '(' | ')')
}

/// Validate a raw location query.
///
/// Checks run in a fixed order (presence, emptiness, length, character
/// class) so that exactly one reason is reported when several apply.
pub fn validate_location(raw: Option<&str>) -> Result<SanitizedLocation, LocationRejection> {
    let raw = raw.ok_or(LocationRejection::Required)?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LocationRejection::Empty);
    }

    if trimmed.chars().count() > MAX_LOCATION_LEN {
        return Err(LocationRejection::TooLong);
    }

    if !trimmed.chars().all(is_allowed_char) {
        return Err(LocationRejection::InvalidCharacters);
    }

    Ok(SanitizedLocation(trimmed.to_string()))
}
