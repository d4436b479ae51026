//! Environment configuration service
//!
//! Each admin operation is a discrete command against one configuration
//! document: load, apply a targeted mutation, store. There is no whole-config
//! replace, so two admins editing different fields never lose each other's
//! writes.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use tracing::info;

use crate::domain::application::ApplicationId;
use crate::domain::environment::{
    validate_flag_key, validate_origin, validate_rate_limits, Environment, EnvironmentConfig,
    EnvironmentConfigId, FlagValue, RateLimits, WebhookSettings,
};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

/// Service for managing per-environment configuration
pub struct EnvironmentConfigService {
    storage: Arc<dyn Storage<EnvironmentConfig>>,
}

impl EnvironmentConfigService {
    pub fn new(storage: Arc<dyn Storage<EnvironmentConfig>>) -> Self {
        Self { storage }
    }

    /// Gets the configuration for an application environment
    pub async fn get(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
    ) -> Result<EnvironmentConfig, DomainError> {
        let id = EnvironmentConfigId::new(application_id, environment);

        self.storage.get(&id).await?.ok_or_else(|| {
            DomainError::not_found(format!("Environment config '{}' not found", id))
        })
    }

    /// Gets the configuration, creating a default one if absent
    pub async fn get_or_create(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
    ) -> Result<EnvironmentConfig, DomainError> {
        let id = EnvironmentConfigId::new(application_id, environment);

        if let Some(config) = self.storage.get(&id).await? {
            return Ok(config);
        }

        let config = EnvironmentConfig::new(application_id.clone(), environment);
        self.storage.create(config.clone()).await
    }

    /// Adds an origin to the allowlist
    pub async fn add_allowed_origin(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        origin: &str,
    ) -> Result<EnvironmentConfig, DomainError> {
        validate_origin(origin).map_err(|e| DomainError::validation(e.to_string()))?;

        let mut config = self.get_or_create(application_id, environment).await?;

        if config.add_origin(origin) {
            info!(
                application_id = %application_id,
                environment = %environment,
                origin = origin,
                "Origin added to allowlist"
            );
            return self.storage.update(config).await;
        }

        Ok(config)
    }

    /// Removes an origin from the allowlist
    pub async fn remove_allowed_origin(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        origin: &str,
    ) -> Result<bool, DomainError> {
        let mut config = self.get(application_id, environment).await?;

        if !config.remove_origin(origin) {
            return Ok(false);
        }

        self.storage.update(config).await?;

        info!(
            application_id = %application_id,
            environment = %environment,
            origin = origin,
            "Origin removed from allowlist"
        );

        Ok(true)
    }

    /// Updates the per-minute and per-day rate limits
    pub async fn update_rate_limits(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        limits: RateLimits,
    ) -> Result<EnvironmentConfig, DomainError> {
        validate_rate_limits(limits.per_minute, limits.per_day)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let mut config = self.get_or_create(application_id, environment).await?;
        config.set_rate_limits(limits);

        info!(
            application_id = %application_id,
            environment = %environment,
            per_minute = limits.per_minute,
            per_day = limits.per_day,
            "Rate limits updated"
        );

        self.storage.update(config).await
    }

    /// Updates webhook settings; the stored signing secret is preserved
    pub async fn update_webhook_settings(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        settings: WebhookSettings,
    ) -> Result<EnvironmentConfig, DomainError> {
        if let Some(url) = &settings.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DomainError::validation(
                    "Webhook URL must start with http:// or https://",
                ));
            }
        }

        if settings.enabled && settings.url.is_none() {
            return Err(DomainError::validation(
                "Webhooks cannot be enabled without a URL",
            ));
        }

        let mut config = self.get_or_create(application_id, environment).await?;
        config.set_webhook_settings(settings);

        info!(
            application_id = %application_id,
            environment = %environment,
            enabled = config.webhook().enabled,
            "Webhook settings updated"
        );

        self.storage.update(config).await
    }

    /// Generates and installs a fresh webhook signing secret
    ///
    /// The plaintext secret is returned to the caller exactly once.
    pub async fn regenerate_webhook_secret(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
    ) -> Result<String, DomainError> {
        let mut config = self.get_or_create(application_id, environment).await?;

        let secret = generate_webhook_secret();
        config.set_webhook_secret(&secret);
        self.storage.update(config).await?;

        info!(
            application_id = %application_id,
            environment = %environment,
            "Webhook signing secret regenerated"
        );

        Ok(secret)
    }

    /// Sets a feature flag
    pub async fn set_feature_flag(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        key: &str,
        value: FlagValue,
    ) -> Result<EnvironmentConfig, DomainError> {
        validate_flag_key(key).map_err(|e| DomainError::validation(e.to_string()))?;

        let mut config = self.get_or_create(application_id, environment).await?;
        config.set_flag(key, value);

        self.storage.update(config).await
    }

    /// Deletes a feature flag; returns false if it was not set
    pub async fn delete_feature_flag(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        key: &str,
    ) -> Result<bool, DomainError> {
        let mut config = self.get(application_id, environment).await?;

        if !config.delete_flag(key) {
            return Ok(false);
        }

        self.storage.update(config).await?;
        Ok(true)
    }
}

/// 32 bytes of random material behind a recognizable `whsec_` prefix
fn generate_webhook_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("whsec_{}", URL_SAFE_NO_PAD.encode(bytes))
}
