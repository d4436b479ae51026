//! API key service
//!
//! Issuance, validation, rotation, and revocation of application API keys.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::domain::api_key::{
    parse_key_prefix, visible_prefix, ApiKeyId, ApiKeyRecord, ApiKeyRepository, ApiKeyStatus,
    KeyType,
};
use crate::domain::application::{Application, ApplicationId, OrganizationId};
use crate::domain::environment::{Environment, EnvironmentConfig, EnvironmentConfigId};
use crate::domain::storage::Storage;
use crate::domain::DomainError;
use crate::infrastructure::observability::record_key_validation;
use crate::infrastructure::rate_limit::{RateLimitDecision, RateLimiter};

use super::generator::KeyGenerator;

/// Result of issuing a key: the stored record plus the plaintext
///
/// The plaintext is returned to the caller exactly once and never persisted
/// or logged.
#[derive(Debug)]
pub struct IssuedKey {
    pub record: ApiKeyRecord,
    pub plaintext: String,
}

/// Successful validation of a presented key
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub key_id: ApiKeyId,
    pub key_type: KeyType,
    pub application_id: ApplicationId,
    pub environment: Environment,
    /// Quota state for the caller's rate-limit response headers
    pub rate_limit: RateLimitDecision,
}

/// Service for managing application API keys
pub struct KeyService<R>
where
    R: ApiKeyRepository,
{
    repository: Arc<R>,
    applications: Arc<dyn Storage<Application>>,
    environments: Arc<dyn Storage<EnvironmentConfig>>,
    rate_limiter: Arc<RateLimiter>,
    generator: KeyGenerator,
    rotation_grace: Duration,
}

impl<R: ApiKeyRepository> KeyService<R> {
    pub fn new(
        repository: Arc<R>,
        applications: Arc<dyn Storage<Application>>,
        environments: Arc<dyn Storage<EnvironmentConfig>>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            repository,
            applications,
            environments,
            rate_limiter,
            generator: KeyGenerator::new(),
            rotation_grace: Duration::hours(24),
        }
    }

    /// Overrides the key generator
    pub fn with_generator(mut self, generator: KeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Overrides the rotation grace window
    pub fn with_rotation_grace(mut self, grace: Duration) -> Self {
        self.rotation_grace = grace;
        self
    }

    /// Issues a new API key for an application environment
    pub async fn generate(
        &self,
        application_id: &ApplicationId,
        organization_id: &OrganizationId,
        environment: Environment,
        key_type: KeyType,
    ) -> Result<IssuedKey, DomainError> {
        if self.applications.get(application_id).await?.is_none() {
            return Err(DomainError::application_not_found(application_id.as_str()));
        }

        let generated = self.generator.generate(key_type, environment);

        let record = ApiKeyRecord::new(
            ApiKeyId::generate(),
            application_id.clone(),
            organization_id.clone(),
            environment,
            key_type,
            &generated.prefix,
            &generated.hash,
        );

        let created = self.repository.create(record).await?;

        info!(
            key_id = %created.id(),
            application_id = %application_id,
            environment = %environment,
            prefix = %created.key_prefix(),
            "API key issued"
        );

        Ok(IssuedKey {
            record: created,
            plaintext: generated.plaintext,
        })
    }

    /// Validates a presented key and counts the request against its limits
    ///
    /// Checks run in order: prefix shape, hash lookup, status and expiry,
    /// origin allowlist (publishable keys only), rate limits. A failure at
    /// any step denies access; no step downgrades to allow.
    pub async fn validate(
        &self,
        presented: &str,
        origin: Option<&str>,
    ) -> Result<ValidationResult, DomainError> {
        let result = self.validate_inner(presented, origin).await;
        record_key_validation(validation_outcome(&result));
        result
    }

    async fn validate_inner(
        &self,
        presented: &str,
        origin: Option<&str>,
    ) -> Result<ValidationResult, DomainError> {
        let parsed = parse_key_prefix(presented)?;

        debug!(prefix = visible_prefix(presented), "Validating API key");

        let hash = self.generator.hash_key(presented);
        let record = self
            .repository
            .get_by_hash(&hash)
            .await?
            .ok_or(DomainError::InvalidKey)?;

        // The prefix must agree with the stored record; a mismatch means the
        // row is corrupt and the key cannot be trusted
        if parsed.key_type != record.key_type() || parsed.environment != record.environment() {
            warn!(
                key_id = %record.id(),
                prefix = %record.key_prefix(),
                "Key prefix disagrees with stored record"
            );
            return Err(DomainError::InvalidKey);
        }

        let now = Utc::now();

        match record.status() {
            ApiKeyStatus::Revoked => return Err(DomainError::KeyRevoked),
            ApiKeyStatus::Expired => return Err(DomainError::KeyExpired),
            ApiKeyStatus::Active | ApiKeyStatus::Rotating => {}
        }

        if record.is_past_expiry(now) {
            // Lazy transition; losing a race changes nothing about the answer
            self.repository
                .transition_status(record.id(), record.status(), ApiKeyStatus::Expired)
                .await?;
            return Err(DomainError::KeyExpired);
        }

        if record.rotation_deadline_passed(now) {
            self.repository
                .transition_status(record.id(), ApiKeyStatus::Rotating, ApiKeyStatus::Revoked)
                .await?;
            return Err(DomainError::KeyRevoked);
        }

        let config = self
            .environments
            .get(&EnvironmentConfigId::new(
                record.application_id(),
                record.environment(),
            ))
            .await?;

        if record.key_type() == KeyType::Publishable {
            let Some(origin) = origin else {
                return Err(DomainError::origin_not_allowed("<missing>"));
            };

            if !config.as_ref().is_some_and(|c| c.origin_allowed(origin)) {
                return Err(DomainError::origin_not_allowed(origin));
            }
        }

        let limits = config.map(|c| c.rate_limits()).unwrap_or_default();
        let decision = self
            .rate_limiter
            .check_and_increment(record.id().as_str(), limits)
            .await?;

        if !decision.allowed {
            return Err(DomainError::rate_limit_exceeded(
                decision.limit,
                decision.reset_at,
            ));
        }

        Ok(ValidationResult {
            key_id: record.id().clone(),
            key_type: record.key_type(),
            application_id: record.application_id().clone(),
            environment: record.environment(),
            rate_limit: decision,
        })
    }

    /// Rotates a key: issues a replacement and opens the grace window
    ///
    /// The old record moves to Rotating via a conditional transition, so two
    /// concurrent rotations cannot both create replacements; the loser gets a
    /// conflict.
    pub async fn rotate(&self, id: &ApiKeyId) -> Result<IssuedKey, DomainError> {
        let old = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        let deadline = Utc::now() + self.rotation_grace;

        if !self.repository.begin_rotation(id, deadline).await? {
            return Err(DomainError::conflict(format!(
                "API key '{}' is not active and cannot be rotated",
                id
            )));
        }

        let issued = self
            .generate(
                old.application_id(),
                old.organization_id(),
                old.environment(),
                old.key_type(),
            )
            .await?;

        info!(
            old_key_id = %id,
            new_key_id = %issued.record.id(),
            deadline = %deadline,
            "API key rotated"
        );

        Ok(issued)
    }

    /// Revokes a key; revoking an already-revoked key is a no-op
    pub async fn revoke(&self, id: &ApiKeyId) -> Result<ApiKeyRecord, DomainError> {
        let record = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        match record.status() {
            ApiKeyStatus::Revoked => return Ok(record),
            ApiKeyStatus::Expired => {
                return Err(DomainError::conflict(format!(
                    "API key '{}' already expired",
                    id
                )))
            }
            ApiKeyStatus::Active | ApiKeyStatus::Rotating => {}
        }

        if !self
            .repository
            .transition_status(id, record.status(), ApiKeyStatus::Revoked)
            .await?
        {
            return Err(DomainError::conflict(format!(
                "API key '{}' changed status concurrently",
                id
            )));
        }

        info!(key_id = %id, "API key revoked");

        self.repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::internal("revoked key disappeared"))
    }

    /// Revokes rotating keys whose grace window has elapsed
    ///
    /// The background companion to the lazy check in validation.
    pub async fn sweep_rotations(&self) -> Result<u32, DomainError> {
        let rotating = self.repository.list(Some(ApiKeyStatus::Rotating)).await?;
        let now = Utc::now();
        let mut swept = 0;

        for record in rotating {
            if record.rotation_deadline_passed(now)
                && self
                    .repository
                    .transition_status(record.id(), ApiKeyStatus::Rotating, ApiKeyStatus::Revoked)
                    .await?
            {
                swept += 1;
            }
        }

        if swept > 0 {
            info!(swept = swept, "Revoked keys past their rotation deadline");
        }

        Ok(swept)
    }

    /// Gets a key record by ID
    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, DomainError> {
        self.repository.get(id).await
    }

    /// Lists key records, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<ApiKeyStatus>,
    ) -> Result<Vec<ApiKeyRecord>, DomainError> {
        self.repository.list(status).await
    }
}

fn validation_outcome(result: &Result<ValidationResult, DomainError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(DomainError::MalformedKey) => "malformed_key",
        Err(DomainError::InvalidKey) => "invalid_key",
        Err(DomainError::KeyRevoked) => "key_revoked",
        Err(DomainError::KeyExpired) => "key_expired",
        Err(DomainError::OriginNotAllowed { .. }) => "origin_not_allowed",
        Err(DomainError::RateLimitExceeded { .. }) => "rate_limit_exceeded",
        Err(_) => "error",
    }
}
