//! Per-application environment configuration

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationId;
use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::webhook::WebhookEventType;
use crate::domain::DomainError;

/// Deployment environment a key or configuration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Staging,
    Development,
    Test,
    Preview,
}

impl Environment {
    /// Short code embedded in key prefixes (e.g. `pk_prod_...`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Production => "prod",
            Self::Staging => "stg",
            Self::Development => "dev",
            Self::Test => "test",
            Self::Preview => "prev",
        }
    }

    /// Parses an environment from its short code or full name
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "prod" | "production" => Ok(Self::Production),
            "stg" | "staging" => Ok(Self::Staging),
            "dev" | "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "prev" | "preview" => Ok(Self::Preview),
            other => Err(DomainError::invalid_environment(other)),
        }
    }

    /// Returns all environments
    pub fn all() -> [Self; 5] {
        [
            Self::Production,
            Self::Staging,
            Self::Development,
            Self::Test,
            Self::Preview,
        ]
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Key for an environment configuration: one per application × environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentConfigId(String);

impl EnvironmentConfigId {
    pub fn new(application_id: &ApplicationId, environment: Environment) -> Self {
        Self(format!("{}/{}", application_id.as_str(), environment.code()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EnvironmentConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for EnvironmentConfigId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request-rate ceilings applied per API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Maximum requests per 60-second window
    pub per_minute: u32,
    /// Maximum requests per 86400-second window
    pub per_day: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 120,
            per_day: 50_000,
        }
    }
}

impl RateLimits {
    pub fn new(per_minute: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_day,
        }
    }
}

/// Outbound webhook settings for one environment
///
/// `secret` is the HMAC signing key. It is never part of a whole-settings
/// replace: only `regenerate_webhook_secret` writes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_secs: u32,
    pub events: HashSet<WebhookEventType>,
}

impl WebhookSettings {
    /// Default retry policy applied when an environment first enables webhooks
    pub fn with_defaults() -> Self {
        Self {
            url: None,
            secret: None,
            enabled: false,
            max_retries: 3,
            retry_delay_secs: 60,
            events: HashSet::new(),
        }
    }
}

/// A feature flag value: boolean, numeric, or string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Configuration for one application × environment pair
///
/// Mutated only through targeted operations (add/remove origin, set/delete
/// flag, ...) so concurrent admin sessions editing different fields never
/// overwrite each other's changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    id: EnvironmentConfigId,
    application_id: ApplicationId,
    environment: Environment,
    /// Ordered list of exact origins or wildcard patterns
    allowed_origins: Vec<String>,
    rate_limits: RateLimits,
    webhook: WebhookSettings,
    feature_flags: HashMap<String, FlagValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EnvironmentConfig {
    /// Creates a configuration with default limits and webhooks disabled
    pub fn new(application_id: ApplicationId, environment: Environment) -> Self {
        let now = Utc::now();
        Self {
            id: EnvironmentConfigId::new(&application_id, environment),
            application_id,
            environment,
            allowed_origins: Vec::new(),
            rate_limits: RateLimits::default(),
            webhook: WebhookSettings::with_defaults(),
            feature_flags: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &EnvironmentConfigId {
        &self.id
    }

    pub fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub fn rate_limits(&self) -> RateLimits {
        self.rate_limits
    }

    pub fn webhook(&self) -> &WebhookSettings {
        &self.webhook
    }

    pub fn feature_flags(&self) -> &HashMap<String, FlagValue> {
        &self.feature_flags
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Targeted mutations

    /// Adds an origin to the allowlist; returns false if already present
    pub fn add_origin(&mut self, origin: impl Into<String>) -> bool {
        let origin = origin.into();
        if self.allowed_origins.contains(&origin) {
            return false;
        }
        self.allowed_origins.push(origin);
        self.touch();
        true
    }

    /// Removes an origin from the allowlist; returns false if absent
    pub fn remove_origin(&mut self, origin: &str) -> bool {
        let before = self.allowed_origins.len();
        self.allowed_origins.retain(|o| o != origin);
        let removed = self.allowed_origins.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_rate_limits(&mut self, limits: RateLimits) {
        self.rate_limits = limits;
        self.touch();
    }

    /// Replaces webhook settings, preserving the stored signing secret
    pub fn set_webhook_settings(&mut self, mut settings: WebhookSettings) {
        settings.secret = self.webhook.secret.take();
        self.webhook = settings;
        self.touch();
    }

    /// Installs a freshly generated signing secret
    pub fn set_webhook_secret(&mut self, secret: impl Into<String>) {
        self.webhook.secret = Some(secret.into());
        self.touch();
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: FlagValue) {
        self.feature_flags.insert(key.into(), value);
        self.touch();
    }

    /// Deletes a flag; returns false if the flag was not set
    pub fn delete_flag(&mut self, key: &str) -> bool {
        let removed = self.feature_flags.remove(key).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    // Queries

    /// Checks a request origin against the allowlist
    ///
    /// Entries either match exactly or, when they contain a `*`, by
    /// substituting a single label for the wildcard
    /// (`https://*.example.com` matches `https://app.example.com` but not
    /// `https://a.b.example.com`).
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|pattern| {
            if pattern.contains('*') {
                wildcard_origin_match(pattern, origin)
            } else {
                pattern == origin
            }
        })
    }

    /// Whether deliveries for this event type should be dispatched
    pub fn subscribes_to(&self, event: WebhookEventType) -> bool {
        self.webhook.enabled && self.webhook.url.is_some() && self.webhook.events.contains(&event)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for EnvironmentConfig {
    type Key = EnvironmentConfigId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

/// Single-label wildcard match: the `*` stands in for exactly one
/// hostname label (no dots, no slashes, non-empty).
fn wildcard_origin_match(pattern: &str, origin: &str) -> bool {
    let Some(star) = pattern.find('*') else {
        return pattern == origin;
    };

    let prefix = &pattern[..star];
    let suffix = &pattern[star + 1..];

    if origin.len() <= prefix.len() + suffix.len() {
        return false;
    }

    if !origin.starts_with(prefix) || !origin.ends_with(suffix) {
        return false;
    }

    let middle = &origin[prefix.len()..origin.len() - suffix.len()];
    !middle.is_empty() && !middle.contains('.') && !middle.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EnvironmentConfig {
        EnvironmentConfig::new(ApplicationId::new("app-1"), Environment::Production)
    }

    #[test]
    fn test_environment_codes() {
        assert_eq!(Environment::Production.code(), "prod");
        assert_eq!(Environment::Staging.code(), "stg");
        assert_eq!(Environment::Development.code(), "dev");
        assert_eq!(Environment::Test.code(), "test");
        assert_eq!(Environment::Preview.code(), "prev");
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("prod").unwrap(), Environment::Production);
        assert_eq!(
            Environment::parse("production").unwrap(),
            Environment::Production
        );
        assert_eq!(Environment::parse("prev").unwrap(), Environment::Preview);

        let err = Environment::parse("qa").unwrap_err();
        assert!(matches!(err, DomainError::InvalidEnvironment { .. }));
    }

    #[test]
    fn test_config_id_format() {
        let id = EnvironmentConfigId::new(&ApplicationId::new("app-1"), Environment::Staging);
        assert_eq!(id.as_str(), "app-1/stg");
    }

    #[test]
    fn test_add_and_remove_origin() {
        let mut config = config();

        assert!(config.add_origin("https://app.example.com"));
        assert!(!config.add_origin("https://app.example.com"));
        assert_eq!(config.allowed_origins().len(), 1);

        assert!(config.remove_origin("https://app.example.com"));
        assert!(!config.remove_origin("https://app.example.com"));
        assert!(config.allowed_origins().is_empty());
    }

    #[test]
    fn test_origin_exact_match() {
        let mut config = config();
        config.add_origin("https://app.example.com");

        assert!(config.origin_allowed("https://app.example.com"));
        assert!(!config.origin_allowed("https://other.example.com"));
        assert!(!config.origin_allowed("http://app.example.com"));
    }

    #[test]
    fn test_origin_wildcard_match() {
        let mut config = config();
        config.add_origin("https://*.example.com");

        assert!(config.origin_allowed("https://app.example.com"));
        assert!(config.origin_allowed("https://staging.example.com"));
        // Wildcard substitutes exactly one label
        assert!(!config.origin_allowed("https://a.b.example.com"));
        assert!(!config.origin_allowed("https://example.com"));
        assert!(!config.origin_allowed("https://.example.com"));
        // Path segments cannot stand in for the label
        assert!(!config.origin_allowed("https://evil/x.example.com"));
    }

    #[test]
    fn test_set_webhook_settings_preserves_secret() {
        let mut config = config();
        config.set_webhook_secret("whsec_original");

        let mut settings = WebhookSettings::with_defaults();
        settings.url = Some("https://hooks.example.com/in".to_string());
        settings.enabled = true;
        settings.events.insert(WebhookEventType::UserCreated);
        config.set_webhook_settings(settings);

        assert_eq!(config.webhook().secret.as_deref(), Some("whsec_original"));
        assert!(config.webhook().enabled);
    }

    #[test]
    fn test_subscribes_to() {
        let mut config = config();
        assert!(!config.subscribes_to(WebhookEventType::UserCreated));

        let mut settings = WebhookSettings::with_defaults();
        settings.url = Some("https://hooks.example.com/in".to_string());
        settings.enabled = true;
        settings.events.insert(WebhookEventType::UserCreated);
        config.set_webhook_settings(settings);

        assert!(config.subscribes_to(WebhookEventType::UserCreated));
        assert!(!config.subscribes_to(WebhookEventType::UserDeleted));
    }

    #[test]
    fn test_feature_flags() {
        let mut config = config();

        config.set_flag("checkout_v2", FlagValue::Bool(true));
        config.set_flag("max_seats", FlagValue::Number(25.0));
        config.set_flag("theme", FlagValue::Text("dark".to_string()));

        assert_eq!(
            config.feature_flags().get("checkout_v2"),
            Some(&FlagValue::Bool(true))
        );

        assert!(config.delete_flag("theme"));
        assert!(!config.delete_flag("theme"));
        assert_eq!(config.feature_flags().len(), 2);
    }

    #[test]
    fn test_flag_value_serialization() {
        assert_eq!(
            serde_json::to_string(&FlagValue::Bool(true)).unwrap(),
            "true"
        );
        assert_eq!(
            serde_json::to_string(&FlagValue::Text("dark".to_string())).unwrap(),
            "\"dark\""
        );
    }
}
