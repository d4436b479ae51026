//! Prometheus metrics infrastructure
//!
//! Counters are the operator-visible surface for security-relevant denials
//! and dead-lettered webhook deliveries; neither may fail silently.

use std::sync::Arc;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for rendering scrapes
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Renders the current metrics in Prometheus exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize the Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("access_core_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Record the outcome of a key validation
pub fn record_key_validation(outcome: &'static str) {
    counter!("key_validations_total", "outcome" => outcome).increment(1);
}

/// Record a webhook delivery attempt outcome
pub fn record_webhook_attempt(event_type: &'static str, outcome: &'static str) {
    counter!(
        "webhook_delivery_attempts_total",
        "event_type" => event_type,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a dead-lettered webhook delivery
pub fn record_webhook_dead_letter(event_type: &'static str) {
    counter!("webhook_dead_letters_total", "event_type" => event_type).increment(1);
}
