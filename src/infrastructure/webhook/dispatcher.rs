//! Webhook dispatcher
//!
//! Turns a domain event into a signed delivery job. Dispatch itself never
//! performs network I/O: it persists a pending delivery and enqueues it for
//! the worker, so event producers never block on third-party endpoints.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::application::ApplicationId;
use crate::domain::environment::{Environment, EnvironmentConfig, EnvironmentConfigId};
use crate::domain::storage::Storage;
use crate::domain::webhook::{
    EventId, WebhookDelivery, WebhookDeliveryRepository, WebhookEnvelope, WebhookEventType,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_webhook_attempt, record_webhook_dead_letter};

use super::signer::{sign_payload, signature_header};

/// Dispatcher for signed webhook deliveries
pub struct WebhookDispatcher<D>
where
    D: WebhookDeliveryRepository,
{
    deliveries: Arc<D>,
    environments: Arc<dyn Storage<EnvironmentConfig>>,
    http: Client,
    queue: mpsc::UnboundedSender<EventId>,
    request_timeout: Duration,
}

impl<D: WebhookDeliveryRepository> WebhookDispatcher<D> {
    /// Creates a dispatcher and the queue receiver for its delivery worker
    pub fn new(
        deliveries: Arc<D>,
        environments: Arc<dyn Storage<EnvironmentConfig>>,
        request_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<EventId>) {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                deliveries,
                environments,
                http,
                queue: tx,
                request_timeout,
            },
            rx,
        )
    }

    /// Dispatches a domain event to the environment's webhook endpoint
    ///
    /// Returns `Ok(None)` when the environment has webhooks disabled or is
    /// not subscribed to the event type. Otherwise the canonical envelope is
    /// serialized and signed exactly once, a pending delivery is persisted,
    /// and its event ID is returned.
    pub async fn dispatch(
        &self,
        application_id: &ApplicationId,
        environment: Environment,
        event_type: WebhookEventType,
        payload: serde_json::Value,
    ) -> Result<Option<EventId>, DomainError> {
        let config = self
            .environments
            .get(&EnvironmentConfigId::new(application_id, environment))
            .await?;

        let Some(config) = config else {
            debug!(
                application_id = %application_id,
                environment = %environment,
                "No environment config, skipping webhook"
            );
            return Ok(None);
        };

        if !config.subscribes_to(event_type) {
            debug!(
                application_id = %application_id,
                environment = %environment,
                event_type = %event_type,
                "Environment not subscribed, skipping webhook"
            );
            return Ok(None);
        }

        let webhook = config.webhook();

        let Some(secret) = webhook.secret.as_deref() else {
            warn!(
                application_id = %application_id,
                environment = %environment,
                "Webhook enabled but no signing secret configured, skipping"
            );
            return Ok(None);
        };

        // subscribes_to guarantees the URL is set
        let Some(url) = webhook.url.as_deref() else {
            return Ok(None);
        };

        let envelope = WebhookEnvelope::new(event_type, payload);
        let canonical = serde_json::to_string(&envelope)
            .map_err(|e| DomainError::internal(format!("Failed to serialize envelope: {}", e)))?;
        let signature = sign_payload(secret, canonical.as_bytes());

        let delivery = WebhookDelivery::new(
            envelope.event_id.clone(),
            application_id.clone(),
            environment,
            event_type,
            url,
            canonical,
            signature,
            envelope.timestamp,
            webhook.max_retries,
            webhook.retry_delay_secs,
        );

        let created = self.deliveries.create(delivery).await?;
        let event_id = created.event_id.clone();

        if self.queue.send(event_id.clone()).is_err() {
            warn!(
                event_id = %event_id,
                "Delivery worker is gone; delivery stays pending"
            );
        }

        info!(
            event_id = %event_id,
            application_id = %application_id,
            event_type = %event_type,
            "Webhook delivery enqueued"
        );

        Ok(Some(event_id))
    }

    /// Looks up the delivery state for an event
    ///
    /// Dead-lettered deliveries surface as [`DomainError::WebhookDeadLettered`]
    /// so operators can distinguish "still retrying" from "gave up".
    pub async fn delivery_status(
        &self,
        event_id: &EventId,
    ) -> Result<WebhookDelivery, DomainError> {
        let delivery = self
            .deliveries
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Delivery for event '{}' not found", event_id))
            })?;

        if delivery.outcome == crate::domain::webhook::DeliveryOutcome::DeadLettered {
            return Err(DomainError::webhook_dead_lettered(event_id.as_str()));
        }

        Ok(delivery)
    }

    /// Performs one HTTP delivery attempt, updating the record in place
    ///
    /// Every attempt posts the stored canonical payload with the stored
    /// signature; nothing is re-signed. A non-2xx response, timeout, or
    /// connection error counts as a failure, schedules the next retry or
    /// dead-letters the delivery, and is reported as
    /// [`DomainError::WebhookDeliveryFailed`].
    pub(crate) async fn attempt(
        &self,
        delivery: &mut WebhookDelivery,
    ) -> Result<(), DomainError> {
        let request = self
            .http
            .post(&delivery.target_url)
            .timeout(self.request_timeout)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", signature_header(&delivery.signature))
            .header("X-Webhook-Timestamp", delivery.event_timestamp.to_string())
            .header("X-Webhook-Event", delivery.event_type.as_str())
            .body(delivery.canonical_payload.clone());

        let failure = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();

                if response.status().is_success() {
                    delivery.record_delivered(status);
                    record_webhook_attempt(delivery.event_type.as_str(), "delivered");
                    info!(
                        event_id = %delivery.event_id,
                        status = status,
                        attempt = delivery.attempt_number,
                        "Webhook delivered"
                    );
                    None
                } else {
                    let message = format!("HTTP status {}", status);
                    delivery.record_failure(&message, Some(status));
                    warn!(
                        event_id = %delivery.event_id,
                        status = status,
                        attempt = delivery.attempt_number,
                        "Webhook delivery failed with HTTP error"
                    );
                    Some(message)
                }
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    "Request timed out".to_string()
                } else if e.is_connect() {
                    "Connection failed".to_string()
                } else {
                    format!("Request failed: {}", e)
                };

                delivery.record_failure(&message, None);
                warn!(
                    event_id = %delivery.event_id,
                    error = %message,
                    attempt = delivery.attempt_number,
                    "Webhook delivery failed"
                );
                Some(message)
            }
        };

        let Some(message) = failure else {
            return Ok(());
        };

        record_webhook_attempt(delivery.event_type.as_str(), "failed");

        if delivery.is_terminal() {
            record_webhook_dead_letter(delivery.event_type.as_str());
            warn!(
                event_id = %delivery.event_id,
                attempts = delivery.attempt_number,
                "Webhook delivery dead-lettered"
            );
        }

        Err(DomainError::webhook_delivery_failed(message))
    }
}
