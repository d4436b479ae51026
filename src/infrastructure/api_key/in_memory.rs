//! In-memory API key repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKeyId, ApiKeyRecord, ApiKeyRepository, ApiKeyStatus};
use crate::domain::DomainError;

/// In-memory implementation of [`ApiKeyRepository`]
///
/// The write lock makes conditional status transitions atomic, standing in
/// for the conditional updates a persistent key-value store would use.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    records: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records.get(id.as_str()).cloned())
    }

    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.key_hash() == key_hash)
            .cloned())
    }

    async fn create(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, DomainError> {
        let mut records = self.records.write().await;
        let id = record.id().as_str().to_string();

        if records.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "API key '{}' already exists",
                id
            )));
        }

        if records.values().any(|r| r.key_hash() == record.key_hash()) {
            return Err(DomainError::conflict("API key hash already exists"));
        }

        records.insert(id, record.clone());
        Ok(record)
    }

    async fn list(&self, status: Option<ApiKeyStatus>) -> Result<Vec<ApiKeyRecord>, DomainError> {
        let records = self.records.read().await;

        Ok(records
            .values()
            .filter(|r| status.is_none_or(|s| r.status() == s))
            .cloned()
            .collect())
    }

    async fn count(&self, status: Option<ApiKeyStatus>) -> Result<usize, DomainError> {
        let records = self.records.read().await;

        Ok(records
            .values()
            .filter(|r| status.is_none_or(|s| r.status() == s))
            .count())
    }

    async fn transition_status(
        &self,
        id: &ApiKeyId,
        expected: ApiKeyStatus,
        next: ApiKeyStatus,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;

        let record = records
            .get_mut(id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        if record.status() != expected {
            return Ok(false);
        }

        record.set_status(next);
        Ok(true)
    }

    async fn begin_rotation(
        &self,
        id: &ApiKeyId,
        deadline: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;

        let record = records
            .get_mut(id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        if record.status() != ApiKeyStatus::Active {
            return Ok(false);
        }

        record.begin_rotation(deadline);
        Ok(true)
    }
}
