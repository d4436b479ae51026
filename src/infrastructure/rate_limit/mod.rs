//! Per-key rate limiting

mod in_memory;
mod limiter;
mod redis;
mod store;

pub use in_memory::InMemoryCounterStore;
pub use limiter::{LimitWindow, RateLimitDecision, RateLimiter};
pub use redis::{RedisCounterConfig, RedisCounterStore};
pub use store::CounterStore;
