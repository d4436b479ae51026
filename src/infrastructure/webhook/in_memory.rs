//! In-memory webhook delivery repository

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::application::ApplicationId;
use crate::domain::webhook::{
    DeliveryOutcome, EventId, WebhookDelivery, WebhookDeliveryRepository,
};
use crate::domain::DomainError;

/// In-memory implementation of [`WebhookDeliveryRepository`]
pub struct InMemoryWebhookDeliveryRepository {
    deliveries: RwLock<HashMap<String, WebhookDelivery>>,
}

impl InMemoryWebhookDeliveryRepository {
    pub fn new() -> Self {
        Self {
            deliveries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryWebhookDeliveryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookDeliveryRepository for InMemoryWebhookDeliveryRepository {
    async fn create(&self, delivery: WebhookDelivery) -> Result<WebhookDelivery, DomainError> {
        let mut deliveries = self
            .deliveries
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        let id = delivery.event_id.as_str().to_string();

        if deliveries.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "Delivery for event '{}' already exists",
                id
            )));
        }

        deliveries.insert(id, delivery.clone());
        Ok(delivery)
    }

    async fn update(&self, delivery: WebhookDelivery) -> Result<WebhookDelivery, DomainError> {
        let mut deliveries = self
            .deliveries
            .write()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        let id = delivery.event_id.as_str().to_string();

        if !deliveries.contains_key(&id) {
            return Err(DomainError::not_found(format!(
                "Delivery for event '{}' not found",
                id
            )));
        }

        deliveries.insert(id, delivery.clone());
        Ok(delivery)
    }

    async fn find_by_id(&self, id: &EventId) -> Result<Option<WebhookDelivery>, DomainError> {
        let deliveries = self
            .deliveries
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(deliveries.get(id.as_str()).cloned())
    }

    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookDelivery>, DomainError> {
        let deliveries = self
            .deliveries
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        let mut due: Vec<_> = deliveries
            .values()
            .filter(|d| d.is_due(now))
            .cloned()
            .collect();

        due.sort_by_key(|d| d.next_attempt_at);
        Ok(due)
    }

    async fn find_by_application(
        &self,
        application_id: &ApplicationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WebhookDelivery>, DomainError> {
        let deliveries = self
            .deliveries
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        let mut result: Vec<_> = deliveries
            .values()
            .filter(|d| &d.application_id == application_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(result.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_by_outcome(&self, outcome: DeliveryOutcome) -> Result<usize, DomainError> {
        let deliveries = self
            .deliveries
            .read()
            .map_err(|_| DomainError::internal("Failed to acquire lock"))?;

        Ok(deliveries.values().filter(|d| d.outcome == outcome).count())
    }
}
