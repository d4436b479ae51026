//! API key record and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::{ApplicationId, OrganizationId};
use crate::domain::environment::Environment;
use crate::domain::storage::{StorageEntity, StorageKey};

/// Opaque identifier for an API key record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKeyId(String);

impl ApiKeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh key identifier
    pub fn generate() -> Self {
        Self(format!("key_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ApiKeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl StorageKey for ApiKeyId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Kind of API key
///
/// Publishable keys may be embedded in browser clients and are additionally
/// checked against the environment's origin allowlist. Secret keys are
/// server-to-server credentials and skip origin checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Publishable,
    Secret,
}

impl KeyType {
    /// Leading prefix token (`pk` or `sk`)
    pub fn token(&self) -> &'static str {
        match self {
            Self::Publishable => "pk",
            Self::Secret => "sk",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "pk" => Some(Self::Publishable),
            "sk" => Some(Self::Secret),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Lifecycle status of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    /// Key is the current credential
    #[default]
    Active,
    /// Key was rotated out and remains valid until its rotation deadline
    Rotating,
    /// Key was revoked, terminal
    Revoked,
    /// Key expired, terminal
    Expired,
}

impl ApiKeyStatus {
    /// Whether a key in this status can still authenticate requests
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active | Self::Rotating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked | Self::Expired)
    }
}

/// Persisted API key record
///
/// Only the one-way hash of the secret material is stored; the plaintext is
/// surfaced exactly once at generation and never again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    id: ApiKeyId,
    application_id: ApplicationId,
    organization_id: OrganizationId,
    environment: Environment,
    key_type: KeyType,
    /// Human-visible prefix of form `{pk|sk}_{env}_{slice}`
    key_prefix: String,
    /// One-way hash of the full key material
    key_hash: String,
    status: ApiKeyStatus,
    /// Set when the key enters Rotating; validation fails past this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    pub fn new(
        id: ApiKeyId,
        application_id: ApplicationId,
        organization_id: OrganizationId,
        environment: Environment,
        key_type: KeyType,
        key_prefix: impl Into<String>,
        key_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            application_id,
            organization_id,
            environment,
            key_type,
            key_prefix: key_prefix.into(),
            key_hash: key_hash.into(),
            status: ApiKeyStatus::Active,
            rotation_deadline: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets an expiration timestamp
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn status(&self) -> ApiKeyStatus {
        self.status
    }

    pub fn rotation_deadline(&self) -> Option<DateTime<Utc>> {
        self.rotation_deadline
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Status checks

    /// Whether `expires_at` has elapsed at `now`
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whether the rotation grace window has elapsed at `now`
    pub fn rotation_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.status == ApiKeyStatus::Rotating
            && self.rotation_deadline.is_some_and(|at| now >= at)
    }

    // Transitions (repositories apply these conditionally)

    /// Active → Rotating with the given grace deadline
    pub fn begin_rotation(&mut self, deadline: DateTime<Utc>) {
        self.status = ApiKeyStatus::Rotating;
        self.rotation_deadline = Some(deadline);
        self.touch();
    }

    pub fn revoke(&mut self) {
        self.status = ApiKeyStatus::Revoked;
        self.touch();
    }

    pub fn mark_expired(&mut self) {
        self.status = ApiKeyStatus::Expired;
        self.touch();
    }

    /// Sets status directly; used by repositories applying a checked transition
    pub(crate) fn set_status(&mut self, status: ApiKeyStatus) {
        self.status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for ApiKeyRecord {
    type Key = ApiKeyId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
