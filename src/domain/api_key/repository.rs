//! API key repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{ApiKeyId, ApiKeyRecord, ApiKeyStatus};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Repository for API key storage
///
/// Status mutations are conditional on the previously observed status so
/// concurrent callers cannot double-rotate a key or resurrect a revoked one.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Gets a key record by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, DomainError>;

    /// Gets a key record by its secret hash (the authentication lookup)
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, DomainError>;

    /// Creates a new key record; the hash must be unique
    async fn create(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord, DomainError>;

    /// Lists key records, optionally filtered by status
    async fn list(&self, status: Option<ApiKeyStatus>) -> Result<Vec<ApiKeyRecord>, DomainError>;

    /// Counts key records, optionally filtered by status
    async fn count(&self, status: Option<ApiKeyStatus>) -> Result<usize, DomainError>;

    /// Atomically moves a key from `expected` to `next` status
    ///
    /// Returns false without mutating when the record is not currently in
    /// `expected` status. Returns an error when the record does not exist.
    async fn transition_status(
        &self,
        id: &ApiKeyId,
        expected: ApiKeyStatus,
        next: ApiKeyStatus,
    ) -> Result<bool, DomainError>;

    /// Atomically moves an Active key into Rotating with the given deadline
    ///
    /// Returns false without mutating when the record is not Active, which
    /// makes rotation exactly-once under concurrent calls.
    async fn begin_rotation(
        &self,
        id: &ApiKeyId,
        deadline: DateTime<Utc>,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_api_key_repository() {
        let mut mock = MockApiKeyRepository::new();

        mock.expect_get_by_hash().returning(|_| Ok(None));
        mock.expect_count().returning(|_| Ok(0));

        assert!(mock.get_by_hash("sha256$none").await.unwrap().is_none());
        assert_eq!(mock.count(None).await.unwrap(), 0);
    }
}
