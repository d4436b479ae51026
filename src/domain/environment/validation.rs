//! Environment configuration validation

use thiserror::Error;

/// Errors raised when validating configuration mutations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("Feature flag key cannot be empty")]
    EmptyFlagKey,

    #[error("Feature flag key exceeds maximum length of {0} characters")]
    FlagKeyTooLong(usize),

    #[error("Feature flag key must be snake_case (lowercase letters, digits, underscores, starting with a letter)")]
    FlagKeyNotSnakeCase,

    #[error("Origin cannot be empty")]
    EmptyOrigin,

    #[error("Origin must start with http:// or https://")]
    OriginMissingScheme,

    #[error("Origin pattern may contain at most one wildcard")]
    TooManyWildcards,

    #[error("Rate limits must be positive")]
    NonPositiveRateLimit,
}

const MAX_FLAG_KEY_LENGTH: usize = 50;

/// Validate a feature flag key: snake_case, at most 50 characters
pub fn validate_flag_key(key: &str) -> Result<(), ConfigValidationError> {
    if key.is_empty() {
        return Err(ConfigValidationError::EmptyFlagKey);
    }

    if key.len() > MAX_FLAG_KEY_LENGTH {
        return Err(ConfigValidationError::FlagKeyTooLong(MAX_FLAG_KEY_LENGTH));
    }

    let mut chars = key.chars();
    let first = chars.next().expect("key is non-empty");

    if !first.is_ascii_lowercase() {
        return Err(ConfigValidationError::FlagKeyNotSnakeCase);
    }

    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '_' {
            return Err(ConfigValidationError::FlagKeyNotSnakeCase);
        }
    }

    Ok(())
}

/// Validate an origin entry (exact origin or wildcard pattern)
pub fn validate_origin(origin: &str) -> Result<(), ConfigValidationError> {
    if origin.is_empty() {
        return Err(ConfigValidationError::EmptyOrigin);
    }

    if !origin.starts_with("http://") && !origin.starts_with("https://") {
        return Err(ConfigValidationError::OriginMissingScheme);
    }

    if origin.matches('*').count() > 1 {
        return Err(ConfigValidationError::TooManyWildcards);
    }

    Ok(())
}

/// Validate rate limits: both windows must allow at least one request
pub fn validate_rate_limits(per_minute: u32, per_day: u32) -> Result<(), ConfigValidationError> {
    if per_minute == 0 || per_day == 0 {
        return Err(ConfigValidationError::NonPositiveRateLimit);
    }

    Ok(())
}
