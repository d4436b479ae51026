//! Delivery worker and retry scheduler
//!
//! A single worker task drains the dispatch queue for first attempts and
//! polls for failed deliveries whose backoff has elapsed. Processing one
//! delivery at a time keeps retries for the same delivery strictly
//! sequential: a retry is never scheduled while a prior attempt is in
//! flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::domain::webhook::{EventId, WebhookDelivery, WebhookDeliveryRepository};

use super::dispatcher::WebhookDispatcher;

/// Worker that performs webhook delivery attempts
pub struct RetryScheduler<D>
where
    D: WebhookDeliveryRepository,
{
    dispatcher: Arc<WebhookDispatcher<D>>,
    deliveries: Arc<D>,
    queue: mpsc::UnboundedReceiver<EventId>,
    poll_interval: Duration,
}

impl<D: WebhookDeliveryRepository + 'static> RetryScheduler<D> {
    pub fn new(
        dispatcher: Arc<WebhookDispatcher<D>>,
        deliveries: Arc<D>,
        queue: mpsc::UnboundedReceiver<EventId>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            deliveries,
            queue,
            poll_interval,
        }
    }

    /// Spawns the worker; it stops when its dispatcher is dropped
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                queued = self.queue.recv() => match queued {
                    Some(event_id) => self.process_queued(&event_id).await,
                    None => {
                        debug!("Dispatch queue closed, stopping delivery worker");
                        break;
                    }
                },
                _ = interval.tick() => self.retry_due().await,
            }
        }
    }

    async fn process_queued(&self, event_id: &EventId) {
        match self.deliveries.find_by_id(event_id).await {
            Ok(Some(delivery)) if !delivery.is_terminal() => {
                self.attempt_and_store(delivery).await;
            }
            Ok(_) => {}
            Err(e) => warn!(event_id = %event_id, error = %e, "Failed to load delivery"),
        }
    }

    async fn retry_due(&self) {
        let due = match self.deliveries.find_due_retries(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "Failed to query due retries");
                return;
            }
        };

        for delivery in due {
            self.attempt_and_store(delivery).await;
        }
    }

    async fn attempt_and_store(&self, mut delivery: WebhookDelivery) {
        if let Err(e) = self.dispatcher.attempt(&mut delivery).await {
            // The failure is already recorded on the delivery; a retry is
            // scheduled unless it dead-lettered
            debug!(event_id = %delivery.event_id, error = %e, "Delivery attempt failed");
        }

        if let Err(e) = self.deliveries.update(delivery).await {
            warn!(error = %e, "Failed to persist delivery attempt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::ApplicationId;
    use crate::domain::environment::{
        Environment, EnvironmentConfig, WebhookSettings,
    };
    use crate::domain::webhook::{DeliveryOutcome, WebhookEventType};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::webhook::in_memory::InMemoryWebhookDeliveryRepository;
    use crate::infrastructure::webhook::signer::sign_payload;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_id() -> ApplicationId {
        ApplicationId::new("app-1")
    }

    struct Harness {
        dispatcher: Arc<WebhookDispatcher<InMemoryWebhookDeliveryRepository>>,
        deliveries: Arc<InMemoryWebhookDeliveryRepository>,
        _worker: JoinHandle<()>,
    }

    async fn harness(url: String, max_retries: u32) -> Harness {
        let mut settings = WebhookSettings::with_defaults();
        settings.url = Some(url);
        settings.enabled = true;
        settings.max_retries = max_retries;
        settings.retry_delay_secs = 0;
        settings.events.insert(WebhookEventType::UserCreated);

        let mut config = EnvironmentConfig::new(app_id(), Environment::Production);
        config.set_webhook_secret("whsec_test");
        config.set_webhook_settings(settings);

        let deliveries = Arc::new(InMemoryWebhookDeliveryRepository::new());
        let environments = Arc::new(InMemoryStorage::with_entities(vec![config]));

        let (dispatcher, rx) = WebhookDispatcher::new(
            deliveries.clone(),
            environments,
            Duration::from_secs(2),
        );
        let dispatcher = Arc::new(dispatcher);

        let worker = RetryScheduler::new(
            dispatcher.clone(),
            deliveries.clone(),
            rx,
            Duration::from_millis(20),
        )
        .spawn();

        Harness {
            dispatcher,
            deliveries,
            _worker: worker,
        }
    }

    async fn wait_for_outcome(
        deliveries: &InMemoryWebhookDeliveryRepository,
        event_id: &EventId,
        outcome: DeliveryOutcome,
    ) -> crate::domain::webhook::WebhookDelivery {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

        loop {
            if let Some(delivery) = deliveries.find_by_id(event_id).await.unwrap() {
                if delivery.outcome == outcome {
                    return delivery;
                }
            }

            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {:?}",
                outcome
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_successful_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists("X-Webhook-Signature"))
            .and(header_exists("X-Webhook-Timestamp"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let harness = harness(format!("{}/hook", server.uri()), 3).await;

        let event_id = harness
            .dispatcher
            .dispatch(
                &app_id(),
                Environment::Production,
                WebhookEventType::UserCreated,
                serde_json::json!({"user_id": "u-1"}),
            )
            .await
            .unwrap()
            .unwrap();

        let delivery =
            wait_for_outcome(&harness.deliveries, &event_id, DeliveryOutcome::Delivered).await;

        assert_eq!(delivery.attempt_number, 1);
        assert_eq!(delivery.response_status, Some(200));
        assert!(delivery.delivered_at.is_some());

        // The receiver can verify the signature over the raw body
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);

        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let signature_header = requests[0]
            .headers
            .get("X-Webhook-Signature")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(
            signature_header,
            format!("sha256={}", sign_payload("whsec_test", body.as_bytes()))
        );
    }

    #[tokio::test]
    async fn test_failing_endpoint_dead_letters_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let harness = harness(format!("{}/hook", server.uri()), 2).await;

        let event_id = harness
            .dispatcher
            .dispatch(
                &app_id(),
                Environment::Production,
                WebhookEventType::UserCreated,
                serde_json::json!({}),
            )
            .await
            .unwrap()
            .unwrap();

        let delivery = wait_for_outcome(
            &harness.deliveries,
            &event_id,
            DeliveryOutcome::DeadLettered,
        )
        .await;

        // Initial attempt plus two retries
        assert_eq!(delivery.attempt_number, 3);
        assert_eq!(delivery.response_status, Some(500));
        assert!(delivery.next_attempt_at.is_none());

        // Dead-lettered deliveries are not retried further
        tokio::time::sleep(Duration::from_millis(100)).await;
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);

        // The terminal failure surfaces as a typed error
        let status = harness.dispatcher.delivery_status(&event_id).await;
        assert!(matches!(
            status.unwrap_err(),
            crate::domain::DomainError::WebhookDeadLettered { .. }
        ));
    }

    #[tokio::test]
    async fn test_every_attempt_posts_identical_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let harness = harness(format!("{}/hook", server.uri()), 2).await;

        let event_id = harness
            .dispatcher
            .dispatch(
                &app_id(),
                Environment::Production,
                WebhookEventType::UserCreated,
                serde_json::json!({"user_id": "u-1"}),
            )
            .await
            .unwrap()
            .unwrap();

        wait_for_outcome(
            &harness.deliveries,
            &event_id,
            DeliveryOutcome::DeadLettered,
        )
        .await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);

        let first_body = &requests[0].body;
        let first_signature = requests[0].headers.get("X-Webhook-Signature").unwrap();

        for request in &requests[1..] {
            assert_eq!(&request.body, first_body);
            assert_eq!(
                request.headers.get("X-Webhook-Signature").unwrap(),
                first_signature
            );
        }
    }

    #[tokio::test]
    async fn test_recovery_after_transient_failure() {
        let server = MockServer::start().await;

        // First request fails, subsequent ones succeed
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let harness = harness(format!("{}/hook", server.uri()), 3).await;

        let event_id = harness
            .dispatcher
            .dispatch(
                &app_id(),
                Environment::Production,
                WebhookEventType::UserCreated,
                serde_json::json!({}),
            )
            .await
            .unwrap()
            .unwrap();

        let delivery =
            wait_for_outcome(&harness.deliveries, &event_id, DeliveryOutcome::Delivered).await;

        assert_eq!(delivery.attempt_number, 2);
        assert_eq!(delivery.response_status, Some(200));

        // A delivered event reads back cleanly
        let status = harness.dispatcher.delivery_status(&event_id).await.unwrap();
        assert_eq!(status.outcome, DeliveryOutcome::Delivered);
    }
}
