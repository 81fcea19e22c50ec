//! Shared utility functions for the keygate application.

use axum::http::HeaderMap;

pub const SECONDS_PER_DAY: i64 = 86400;

/// Days remaining until `expires_at`, rounded up, floored at zero.
///
/// A license that expires in 90 seconds still reports one remaining day;
/// this is what the client loader displays to the user.
pub fn days_remaining(expires_at: Option<i64>, now: i64) -> i64 {
    match expires_at {
        Some(exp) if exp > now => ((exp - now) as u64).div_ceil(SECONDS_PER_DAY as u64) as i64,
        _ => 0,
    }
}

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`,
/// and extracts the `user-agent` header for audit logging.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Normalize an email for storage and lookup: NFKC, trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    email.trim().nfkc().collect::<String>().to_lowercase()
}
