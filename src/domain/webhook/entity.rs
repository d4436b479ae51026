//! Webhook domain entities

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationId;
use crate::domain::environment::Environment;
use crate::domain::storage::{StorageEntity, StorageKey};

/// Ceiling for the exponential backoff between retries
pub const MAX_RETRY_DELAY_SECS: u32 = 3600;

/// Unique identifier for a domain event (and its delivery record)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh event identifier
    pub fn generate() -> Self {
        Self(format!("evt_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl StorageKey for EventId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Domain events that environments can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    GroupCreated,
    GroupDeleted,
    ApplicationUpdated,
    KeyRotated,
    KeyRevoked,
}

impl WebhookEventType {
    /// Returns all available event types
    pub fn all() -> Vec<Self> {
        vec![
            Self::UserCreated,
            Self::UserUpdated,
            Self::UserDeleted,
            Self::GroupCreated,
            Self::GroupDeleted,
            Self::ApplicationUpdated,
            Self::KeyRotated,
            Self::KeyRevoked,
        ]
    }

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "USER_CREATED",
            Self::UserUpdated => "USER_UPDATED",
            Self::UserDeleted => "USER_DELETED",
            Self::GroupCreated => "GROUP_CREATED",
            Self::GroupDeleted => "GROUP_DELETED",
            Self::ApplicationUpdated => "APPLICATION_UPDATED",
            Self::KeyRotated => "KEY_ROTATED",
            Self::KeyRevoked => "KEY_REVOKED",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical payload envelope sent to webhook receivers
///
/// Serialized exactly once per event; the resulting byte sequence is what the
/// HMAC signature covers and what every delivery attempt posts verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub event_type: WebhookEventType,
    pub event_id: EventId,
    /// Unix timestamp (seconds) of when the event occurred
    pub timestamp: i64,
    pub data: serde_json::Value,
}

impl WebhookEnvelope {
    pub fn new(event_type: WebhookEventType, data: serde_json::Value) -> Self {
        Self {
            event_type,
            event_id: EventId::generate(),
            timestamp: Utc::now().timestamp(),
            data,
        }
    }
}

/// Outcome of a webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// First attempt not yet made
    Pending,
    /// Delivered, terminal
    Delivered,
    /// Last attempt failed, a retry is scheduled
    Failed,
    /// All retries exhausted, terminal
    DeadLettered,
}

impl DeliveryOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::DeadLettered)
    }
}

/// Delivery record for a single domain event
///
/// Created once per event, updated in place per attempt, immutable once
/// delivered or dead-lettered. The canonical payload and signature are
/// captured at creation so every attempt posts identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub event_id: EventId,
    pub application_id: ApplicationId,
    pub environment: Environment,
    pub event_type: WebhookEventType,
    pub target_url: String,
    pub canonical_payload: String,
    /// Hex-encoded HMAC-SHA256 over the canonical payload
    pub signature: String,
    /// Unix timestamp carried in the `X-Webhook-Timestamp` header
    pub event_timestamp: i64,
    /// Number of attempts made so far
    pub attempt_number: u32,
    /// Maximum retries after the initial attempt
    pub max_retries: u32,
    /// Base delay for the exponential backoff
    pub retry_delay_secs: u32,
    pub outcome: DeliveryOutcome,
    pub scheduled_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub response_status: Option<u16>,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        envelope_id: EventId,
        application_id: ApplicationId,
        environment: Environment,
        event_type: WebhookEventType,
        target_url: impl Into<String>,
        canonical_payload: impl Into<String>,
        signature: impl Into<String>,
        event_timestamp: i64,
        max_retries: u32,
        retry_delay_secs: u32,
    ) -> Self {
        Self {
            event_id: envelope_id,
            application_id,
            environment,
            event_type,
            target_url: target_url.into(),
            canonical_payload: canonical_payload.into(),
            signature: signature.into(),
            event_timestamp,
            attempt_number: 0,
            max_retries,
            retry_delay_secs,
            outcome: DeliveryOutcome::Pending,
            scheduled_at: Utc::now(),
            delivered_at: None,
            response_status: None,
            last_error: None,
            next_attempt_at: None,
        }
    }

    /// Records a successful attempt; the record becomes immutable
    pub fn record_delivered(&mut self, status: u16) {
        if self.outcome.is_terminal() {
            return;
        }

        self.attempt_number += 1;
        self.outcome = DeliveryOutcome::Delivered;
        self.response_status = Some(status);
        self.delivered_at = Some(Utc::now());
        self.next_attempt_at = None;
    }

    /// Records a failed attempt, scheduling a retry or dead-lettering
    ///
    /// Retry `n` (1-based, counted after the immediate first attempt) is
    /// delayed by `retry_delay_secs * 2^(n-1)`, capped at
    /// [`MAX_RETRY_DELAY_SECS`].
    pub fn record_failure(&mut self, error: impl Into<String>, status: Option<u16>) {
        if self.outcome.is_terminal() {
            return;
        }

        self.attempt_number += 1;
        self.response_status = status;
        self.last_error = Some(error.into());

        let retries_used = self.attempt_number.saturating_sub(1);

        if retries_used >= self.max_retries {
            self.outcome = DeliveryOutcome::DeadLettered;
            self.next_attempt_at = None;
        } else {
            let retry = retries_used + 1;
            let delay = self
                .retry_delay_secs
                .saturating_mul(2u32.saturating_pow(retry - 1))
                .min(MAX_RETRY_DELAY_SECS);

            self.outcome = DeliveryOutcome::Failed;
            self.next_attempt_at = Some(Utc::now() + Duration::seconds(i64::from(delay)));
        }
    }

    /// Whether a retry is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.outcome == DeliveryOutcome::Failed
            && self.next_attempt_at.is_some_and(|at| at <= now)
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }
}

impl StorageEntity for WebhookDelivery {
    type Key = EventId;

    fn key(&self) -> &Self::Key {
        &self.event_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(max_retries: u32, retry_delay_secs: u32) -> WebhookDelivery {
        WebhookDelivery::new(
            EventId::new("evt_1"),
            ApplicationId::new("app-1"),
            Environment::Production,
            WebhookEventType::UserCreated,
            "https://hooks.example.com/in",
            r#"{"eventType":"USER_CREATED","eventId":"evt_1","timestamp":0,"data":{}}"#,
            "deadbeef",
            0,
            max_retries,
            retry_delay_secs,
        )
    }

    fn delay_secs(d: &WebhookDelivery) -> i64 {
        (d.next_attempt_at.unwrap() - Utc::now()).num_seconds()
    }

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(WebhookEventType::UserCreated.as_str(), "USER_CREATED");
        assert_eq!(WebhookEventType::KeyRotated.as_str(), "KEY_ROTATED");
        assert_eq!(
            serde_json::to_string(&WebhookEventType::UserCreated).unwrap(),
            "\"USER_CREATED\""
        );
    }

    #[test]
    fn test_envelope_field_order() {
        let envelope = WebhookEnvelope {
            event_type: WebhookEventType::UserCreated,
            event_id: EventId::new("evt_1"),
            timestamp: 1700000000,
            data: serde_json::json!({"user_id": "u-1"}),
        };

        let canonical = serde_json::to_string(&envelope).unwrap();
        assert_eq!(
            canonical,
            r#"{"eventType":"USER_CREATED","eventId":"evt_1","timestamp":1700000000,"data":{"user_id":"u-1"}}"#
        );
    }

    #[test]
    fn test_delivery_starts_pending() {
        let d = delivery(3, 10);
        assert_eq!(d.outcome, DeliveryOutcome::Pending);
        assert_eq!(d.attempt_number, 0);
        assert!(!d.is_terminal());
    }

    #[test]
    fn test_delivered_is_terminal() {
        let mut d = delivery(3, 10);
        d.record_delivered(204);

        assert_eq!(d.outcome, DeliveryOutcome::Delivered);
        assert_eq!(d.attempt_number, 1);
        assert_eq!(d.response_status, Some(204));
        assert!(d.delivered_at.is_some());
        assert!(d.is_terminal());
    }

    #[test]
    fn test_backoff_sequence() {
        let mut d = delivery(3, 10);

        d.record_failure("HTTP status 500", Some(500));
        assert_eq!(d.outcome, DeliveryOutcome::Failed);
        assert!((9..=10).contains(&delay_secs(&d)));

        d.record_failure("HTTP status 500", Some(500));
        assert!((19..=20).contains(&delay_secs(&d)));

        d.record_failure("HTTP status 500", Some(500));
        assert!((39..=40).contains(&delay_secs(&d)));

        // Fourth failure exhausts the three retries
        d.record_failure("HTTP status 500", Some(500));
        assert_eq!(d.outcome, DeliveryOutcome::DeadLettered);
        assert_eq!(d.attempt_number, 4);
        assert!(d.next_attempt_at.is_none());
        assert!(d.is_terminal());
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut d = delivery(20, 600);

        for _ in 0..5 {
            d.record_failure("timeout", None);
        }

        // 600 * 2^4 = 9600 would exceed the ceiling
        assert!(delay_secs(&d) <= i64::from(MAX_RETRY_DELAY_SECS));
    }

    #[test]
    fn test_zero_retries_dead_letters_immediately() {
        let mut d = delivery(0, 10);

        d.record_failure("connection refused", None);
        assert_eq!(d.outcome, DeliveryOutcome::DeadLettered);
        assert_eq!(d.attempt_number, 1);
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let mut d = delivery(3, 10);
        d.record_delivered(200);

        d.record_failure("late failure", Some(500));
        assert_eq!(d.outcome, DeliveryOutcome::Delivered);
        assert_eq!(d.attempt_number, 1);
        assert_eq!(d.response_status, Some(200));
    }

    #[test]
    fn test_is_due() {
        let mut d = delivery(3, 0);
        assert!(!d.is_due(Utc::now()));

        d.record_failure("HTTP status 502", Some(502));
        assert!(d.is_due(Utc::now() + Duration::seconds(1)));

        let mut later = delivery(3, 600);
        later.record_failure("HTTP status 502", Some(502));
        assert!(!later.is_due(Utc::now()));
    }

    #[test]
    fn test_signature_is_stable_across_attempts() {
        let mut d = delivery(3, 10);
        let signature = d.signature.clone();
        let payload = d.canonical_payload.clone();

        d.record_failure("HTTP status 500", Some(500));
        d.record_failure("timeout", None);

        assert_eq!(d.signature, signature);
        assert_eq!(d.canonical_payload, payload);
    }
}
