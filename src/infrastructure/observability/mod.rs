//! Metrics and observability

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    init_metrics, record_key_validation, record_webhook_attempt, record_webhook_dead_letter,
    PrometheusMetrics,
};
