//! Webhook delivery repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DeliveryOutcome, EventId, WebhookDelivery};
use crate::domain::application::ApplicationId;
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Repository for webhook delivery persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WebhookDeliveryRepository: Send + Sync {
    /// Creates a new delivery record
    async fn create(&self, delivery: WebhookDelivery) -> Result<WebhookDelivery, DomainError>;

    /// Updates an existing delivery record
    async fn update(&self, delivery: WebhookDelivery) -> Result<WebhookDelivery, DomainError>;

    /// Finds a delivery by its event ID
    async fn find_by_id(&self, id: &EventId) -> Result<Option<WebhookDelivery>, DomainError>;

    /// Finds failed deliveries whose retry is due at `now`
    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookDelivery>, DomainError>;

    /// Lists deliveries for an application, newest first
    async fn find_by_application(
        &self,
        application_id: &ApplicationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WebhookDelivery>, DomainError>;

    /// Counts deliveries with a given outcome
    async fn count_by_outcome(&self, outcome: DeliveryOutcome) -> Result<usize, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_delivery_repository() {
        let mut mock = MockWebhookDeliveryRepository::new();

        mock.expect_find_due_retries().returning(|_| Ok(vec![]));

        let result = mock.find_due_retries(Utc::now()).await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }
}
