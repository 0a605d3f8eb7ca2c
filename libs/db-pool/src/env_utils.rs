//! Environment variable parsing helpers shared by every config struct in the
//! workspace, so `from_env()` constructors never need to `unwrap()`.

use std::str::FromStr;

pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn parse_env_optional<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

pub fn parse_env_required<T: FromStr>(key: &str) -> Result<T, String> {
    std::env::var(key)
        .map_err(|_| format!("environment variable {} not found", key))?
        .parse()
        .map_err(|_| format!("failed to parse environment variable {}", key))
}
