use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core domain errors
///
/// Access-check failures are first-class variants so callers can map them to
/// precise rejections without string matching. A failed security check is
/// always returned as an error, never downgraded to a permissive result.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Malformed API key")]
    MalformedKey,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("API key has been revoked")]
    KeyRevoked,

    #[error("API key has expired")]
    KeyExpired,

    #[error("Origin '{origin}' is not allowed")]
    OriginNotAllowed { origin: String },

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimitExceeded {
        limit: u32,
        reset_at: DateTime<Utc>,
    },

    #[error("Application '{application_id}' not found")]
    ApplicationNotFound { application_id: String },

    #[error("Invalid environment: '{value}'")]
    InvalidEnvironment { value: String },

    #[error("Webhook delivery failed: {message}")]
    WebhookDeliveryFailed { message: String },

    #[error("Webhook delivery for event '{event_id}' was dead-lettered")]
    WebhookDeadLettered { event_id: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn origin_not_allowed(origin: impl Into<String>) -> Self {
        Self::OriginNotAllowed {
            origin: origin.into(),
        }
    }

    pub fn rate_limit_exceeded(limit: u32, reset_at: DateTime<Utc>) -> Self {
        Self::RateLimitExceeded { limit, reset_at }
    }

    pub fn application_not_found(application_id: impl Into<String>) -> Self {
        Self::ApplicationNotFound {
            application_id: application_id.into(),
        }
    }

    pub fn invalid_environment(value: impl Into<String>) -> Self {
        Self::InvalidEnvironment {
            value: value.into(),
        }
    }

    pub fn webhook_delivery_failed(message: impl Into<String>) -> Self {
        Self::WebhookDeliveryFailed {
            message: message.into(),
        }
    }

    pub fn webhook_dead_lettered(event_id: impl Into<String>) -> Self {
        Self::WebhookDeadLettered {
            event_id: event_id.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error denies access to the presented credential
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::MalformedKey
                | Self::InvalidKey
                | Self::KeyRevoked
                | Self::KeyExpired
                | Self::OriginNotAllowed { .. }
                | Self::RateLimitExceeded { .. }
        )
    }
}
