//! Domain layer - Core business logic and entities

pub mod api_key;
pub mod application;
pub mod environment;
pub mod error;
pub mod storage;
pub mod webhook;

pub use api_key::{
    format_prefix, parse_key_prefix, visible_prefix, ApiKeyId, ApiKeyRecord, ApiKeyRepository,
    ApiKeyStatus, KeyType, ParsedPrefix,
};
pub use application::{Application, ApplicationId, OrganizationId};
pub use environment::{
    validate_flag_key, validate_origin, validate_rate_limits, ConfigValidationError, Environment,
    EnvironmentConfig, EnvironmentConfigId, FlagValue, RateLimits, WebhookSettings,
};
pub use error::DomainError;
pub use storage::{Storage, StorageEntity, StorageKey};
pub use webhook::{
    DeliveryOutcome, EventId, WebhookDelivery, WebhookDeliveryRepository, WebhookEnvelope,
    WebhookEventType,
};
