//! Environment configuration domain

mod entity;
mod validation;

pub use entity::{
    Environment, EnvironmentConfig, EnvironmentConfigId, FlagValue, RateLimits, WebhookSettings,
};
pub use validation::{
    validate_flag_key, validate_origin, validate_rate_limits, ConfigValidationError,
};
