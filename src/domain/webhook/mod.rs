//! Webhook delivery domain

mod entity;
mod repository;

pub use entity::{
    DeliveryOutcome, EventId, WebhookDelivery, WebhookEnvelope, WebhookEventType,
    MAX_RETRY_DELAY_SECS,
};
pub use repository::WebhookDeliveryRepository;

#[cfg(test)]
pub use repository::MockWebhookDeliveryRepository;
