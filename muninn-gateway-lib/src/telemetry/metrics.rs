use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::error::{GatewayError, Result};

pub mod labels {
    pub const SCOPE: &str = "scope";
    pub const MODE: &str = "mode";
    pub const TRANSITION: &str = "transition";
    pub const OUTCOME: &str = "outcome";
    pub const CHANNEL: &str = "channel";
    pub const VERSION: &str = "version";
}

pub mod values {
    pub const MODE_DISTRIBUTED: &str = "distributed";
    pub const MODE_LOCAL: &str = "local";
    pub const MODE_FAIL_OPEN: &str = "fail_open";
    pub const TRANSITION_DEGRADED: &str = "degraded";
    pub const TRANSITION_RECOVERED: &str = "recovered";
    pub const OUTCOME_SUCCESS: &str = "success";
    pub const OUTCOME_FAILURE: &str = "failure";
    pub const OUTCOME_ACCEPTED: &str = "accepted";
    pub const OUTCOME_DROPPED: &str = "dropped";
}

#[derive(Clone)]
pub struct Metrics {
    // Rate limiting
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,
    pub rate_limit_fallback_transitions_total: Counter<u64>,

    // Route cache
    pub route_refreshes_total: Counter<u64>,
    pub route_cache_size: Gauge<u64>,

    // Invalidation
    pub invalidation_messages_total: Counter<u64>,
    pub invalidation_reconnects_total: Counter<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            rate_limit_allowed_total: meter
                .u64_counter("muninn_rate_limit_allowed_total")
                .with_description("Requests allowed by a rate limit check")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("muninn_rate_limit_rejected_total")
                .with_description("Requests rejected by a rate limit check")
                .build(),
            rate_limit_fallback_transitions_total: meter
                .u64_counter("muninn_rate_limit_fallback_transitions_total")
                .with_description("Switches between distributed and local rate limiting")
                .build(),
            route_refreshes_total: meter
                .u64_counter("muninn_route_refreshes_total")
                .with_description("Route snapshot refresh attempts")
                .build(),
            route_cache_size: meter
                .u64_gauge("muninn_route_cache_size")
                .with_description("Published routes in the current snapshot")
                .build(),
            invalidation_messages_total: meter
                .u64_counter("muninn_invalidation_messages_total")
                .with_description("Invalidation messages received")
                .build(),
            invalidation_reconnects_total: meter
                .u64_counter("muninn_invalidation_reconnects_total")
                .with_description("Reconnect attempts of invalidation subscriptions")
                .build(),
            build_info: meter
                .u64_gauge("muninn_build_info")
                .with_description("Build information (version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        self.build_info
            .record(1, &[KeyValue::new(labels::VERSION, env!("CARGO_PKG_VERSION"))]);
    }

    pub fn record_rate_limit_decision(&self, allowed: bool, scope: &'static str, mode: &'static str) {
        let attrs = [KeyValue::new(labels::SCOPE, scope), KeyValue::new(labels::MODE, mode)];
        if allowed {
            self.rate_limit_allowed_total.add(1, &attrs);
        } else {
            self.rate_limit_rejected_total.add(1, &attrs);
        }
    }

    pub fn record_fallback_transition(&self, transition: &'static str) {
        self.rate_limit_fallback_transitions_total
            .add(1, &[KeyValue::new(labels::TRANSITION, transition)]);
    }

    pub fn record_route_refresh(&self, outcome: &'static str) {
        self.route_refreshes_total
            .add(1, &[KeyValue::new(labels::OUTCOME, outcome)]);
    }

    pub fn set_route_cache_size(&self, size: usize) {
        self.route_cache_size.record(size as u64, &[]);
    }

    pub fn record_invalidation_message(&self, channel: &str, outcome: &'static str) {
        self.invalidation_messages_total.add(
            1,
            &[
                KeyValue::new(labels::CHANNEL, channel.to_string()),
                KeyValue::new(labels::OUTCOME, outcome),
            ],
        );
    }

    pub fn record_reconnect(&self, channel: &str) {
        self.invalidation_reconnects_total
            .add(1, &[KeyValue::new(labels::CHANNEL, channel.to_string())]);
    }
}

/// Set up the OpenTelemetry meter provider backed by a Prometheus registry.
pub fn init_metrics() -> std::result::Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("muninn-gateway");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| GatewayError::Metrics(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| GatewayError::Metrics(format!("Metrics are not valid UTF-8: {e}")))
}
