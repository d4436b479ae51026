//! API key infrastructure

mod generator;
mod in_memory;
mod service;

pub use generator::{GeneratedKey, KeyGenerator};
pub use in_memory::InMemoryApiKeyRepository;
pub use service::{IssuedKey, KeyService, ValidationResult};
