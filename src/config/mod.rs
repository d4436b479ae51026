//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CounterBackend, LogFormat, LoggingConfig, RateLimitConfig, RotationConfig,
    WebhookConfig,
};
