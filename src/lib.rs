//! Application access and event delivery core
//!
//! The credential and outbound-event subsystem behind a multi-tenant
//! application console:
//! - Dual-typed API keys (publishable vs. secret) with hash-at-rest storage,
//!   prefix-based classification, and one-time plaintext disclosure
//! - Validation with origin allowlists, expiry, and per-key rate limiting
//!   over an atomic counter store (in-memory or Redis)
//! - Zero-downtime key rotation with a dual-key grace window
//! - At-least-once webhook delivery with HMAC-SHA256 signing, exponential
//!   backoff, and dead-lettering surfaced through metrics

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use config::CounterBackend;
use domain::application::Application;
use domain::environment::EnvironmentConfig;
use domain::storage::Storage;
use infrastructure::api_key::{InMemoryApiKeyRepository, KeyService};
use infrastructure::environment::EnvironmentConfigService;
use infrastructure::observability::{init_metrics, PrometheusMetrics};
use infrastructure::rate_limit::{
    CounterStore, InMemoryCounterStore, RateLimiter, RedisCounterConfig, RedisCounterStore,
};
use infrastructure::storage::InMemoryStorage;
use infrastructure::webhook::{
    InMemoryWebhookDeliveryRepository, RetryScheduler, WebhookDispatcher,
};

/// The wired-up core services
///
/// Handed to the transport layer (GraphQL resolvers, admin API) which exposes
/// them; this crate deliberately has no HTTP surface of its own.
pub struct CoreServices {
    pub key_service: Arc<KeyService<InMemoryApiKeyRepository>>,
    pub environment_service: Arc<EnvironmentConfigService>,
    pub dispatcher: Arc<WebhookDispatcher<InMemoryWebhookDeliveryRepository>>,
    pub applications: Arc<dyn Storage<Application>>,
    pub deliveries: Arc<InMemoryWebhookDeliveryRepository>,
    pub metrics: Option<PrometheusMetrics>,
    /// The delivery worker; runs until the dispatcher is dropped
    pub delivery_worker: JoinHandle<()>,
}

/// Create the core services with default configuration
pub async fn build_services() -> anyhow::Result<CoreServices> {
    build_services_with_config(&AppConfig::default()).await
}

/// Create the core services with custom configuration
pub async fn build_services_with_config(config: &AppConfig) -> anyhow::Result<CoreServices> {
    let metrics = init_metrics(&config.metrics);

    let counter_store: Arc<dyn CounterStore> = match config.rate_limit.backend {
        CounterBackend::Memory => {
            info!("Using in-memory rate-limit counters");
            Arc::new(InMemoryCounterStore::new())
        }
        CounterBackend::Redis => {
            info!("Using Redis rate-limit counters");
            Arc::new(
                RedisCounterStore::new(
                    RedisCounterConfig::new(&config.rate_limit.redis_url).with_key_prefix("access"),
                )
                .await?,
            )
        }
    };

    let applications: Arc<dyn Storage<Application>> =
        Arc::new(InMemoryStorage::<Application>::new());
    let environments: Arc<dyn Storage<EnvironmentConfig>> =
        Arc::new(InMemoryStorage::<EnvironmentConfig>::new());

    let rate_limiter = Arc::new(RateLimiter::new(counter_store));

    let key_service = Arc::new(
        KeyService::new(
            Arc::new(InMemoryApiKeyRepository::new()),
            applications.clone(),
            environments.clone(),
            rate_limiter,
        )
        .with_rotation_grace(chrono::Duration::seconds(
            i64::try_from(config.rotation.grace_period_secs)?,
        )),
    );

    let environment_service = Arc::new(EnvironmentConfigService::new(environments.clone()));

    let deliveries = Arc::new(InMemoryWebhookDeliveryRepository::new());
    let (dispatcher, queue) = WebhookDispatcher::new(
        deliveries.clone(),
        environments,
        Duration::from_secs(config.webhook.request_timeout_secs),
    );
    let dispatcher = Arc::new(dispatcher);

    let delivery_worker = RetryScheduler::new(
        dispatcher.clone(),
        deliveries.clone(),
        queue,
        Duration::from_millis(config.webhook.retry_poll_interval_ms),
    )
    .spawn();

    info!("Access core services initialized");

    Ok(CoreServices {
        key_service,
        environment_service,
        dispatcher,
        applications,
        deliveries,
        metrics,
        delivery_worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::KeyType;
    use crate::domain::application::{ApplicationId, OrganizationId};
    use crate::domain::environment::Environment;

    #[tokio::test]
    async fn test_build_services_and_issue_key() {
        let config = AppConfig {
            metrics: crate::infrastructure::observability::MetricsConfig { enabled: false },
            ..AppConfig::default()
        };
        let services = build_services_with_config(&config).await.unwrap();

        services
            .applications
            .create(Application::new(
                ApplicationId::new("app-1"),
                OrganizationId::new("org-1"),
                "Billing Portal",
            ))
            .await
            .unwrap();

        let issued = services
            .key_service
            .generate(
                &ApplicationId::new("app-1"),
                &OrganizationId::new("org-1"),
                Environment::Development,
                KeyType::Secret,
            )
            .await
            .unwrap();

        let validated = services
            .key_service
            .validate(&issued.plaintext, None)
            .await
            .unwrap();

        assert_eq!(validated.environment, Environment::Development);
    }
}
