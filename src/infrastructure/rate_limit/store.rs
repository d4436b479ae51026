//! Counter store trait

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// An atomically-incrementing counter store with TTL expiry
///
/// Counters are created lazily on first increment and expire on their own;
/// expired counters read as zero on the next increment. Increments must be
/// atomic so two concurrent requests can never both observe a pre-boundary
/// count.
#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    /// Atomically increments the counter and returns the new value
    ///
    /// The TTL is fixed when the counter is created.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, DomainError>;
}
