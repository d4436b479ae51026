//! In-memory counter store

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::DomainError;

use super::store::CounterStore;

/// How often expired counters are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

/// In-memory implementation of [`CounterStore`]
///
/// A single mutex around the map makes increment-and-read atomic. Expired
/// counters are treated as absent and purged opportunistically.
#[derive(Debug)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    last_cleanup: Mutex<Instant>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    async fn maybe_cleanup(&self) {
        let mut last = self.last_cleanup.lock().await;
        if last.elapsed() < CLEANUP_INTERVAL {
            return;
        }
        *last = Instant::now();
        drop(last);

        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        counters.retain(|_, c| c.expires_at > now);
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, DomainError> {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut counters = self.counters.lock().await;

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: now + ttl,
        });

        // An expired counter restarts from zero with a fresh TTL
        if counter.expires_at <= now {
            counter.value = 0;
            counter.expires_at = now + ttl;
        }

        counter.value += 1;
        Ok(counter.value)
    }
}
