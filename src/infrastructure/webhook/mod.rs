//! Webhook delivery infrastructure

mod dispatcher;
mod in_memory;
mod retry;
mod signer;

pub use dispatcher::WebhookDispatcher;
pub use in_memory::InMemoryWebhookDeliveryRepository;
pub use retry::RetryScheduler;
pub use signer::{sign_payload, signature_header, verify_signature};
