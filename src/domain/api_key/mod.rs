//! API key domain

mod entity;
mod prefix;
mod repository;

pub use entity::{ApiKeyId, ApiKeyRecord, ApiKeyStatus, KeyType};
pub use prefix::{format_prefix, parse_key_prefix, visible_prefix, ParsedPrefix, PREFIX_SLICE_LEN};
pub use repository::ApiKeyRepository;

#[cfg(test)]
pub use repository::MockApiKeyRepository;
