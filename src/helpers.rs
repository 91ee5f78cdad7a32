//! Shared helpers for logging and diagnostics output.
//!
//! - `mask_secret`: reduces a credential to a hint safe for logs and `/env`
//! - `truncate_preview`: caps raw upstream bodies shown by `/test`
//! - `retry_after_secs`: converts a rate-limit reset time into a `Retry-After` value

use chrono::{DateTime, Utc};

/// Maximum number of characters of an upstream body shown in diagnostics.
pub(crate) const PREVIEW_MAX_CHARS: usize = 200;

/// Mask a secret, keeping only its last 4 characters.
///
/// Secrets of 4 characters or fewer are masked entirely.
pub(crate) fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(len - 4).collect();
    format!("****{}", tail)
}

/// Truncate a body to `PREVIEW_MAX_CHARS` characters, appending "..." when cut.
pub(crate) fn truncate_preview(body: &str) -> String {
    if body.chars().count() > PREVIEW_MAX_CHARS {
        let head: String = body.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}

/// Whole seconds from `now` until `reset_at`, rounded up and never below 1.
pub(crate) fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds();
    if millis <= 0 {
        return 1;
    }
    ((millis as u64) + 999) / 1000
}
