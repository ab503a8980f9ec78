use std::env;
use std::str::FromStr;

use super::ConfigError;

/// Parse a boolean value from a string, supporting multiple formats
///
/// Accepts: "true", "false", "1", "0", "yes", "no" (case insensitive)
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Non-empty environment variable
pub fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Environment variable parsed as `T`. A set-but-malformed value is an error.
pub fn env_parse<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

pub fn env_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    match env_string(key) {
        Some(value) => parse_bool(value.trim())
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key,
                value,
                reason: "expected true/false, 1/0 or yes/no".to_string(),
            }),
        None => Ok(None),
    }
}
