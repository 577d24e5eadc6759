//! Resolver metrics instrumentation
//!
//! Instruments come from the OpenTelemetry global meter. Until the host
//! installs a meter provider they are no-ops, so library users pay nothing.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;

pub use opentelemetry::KeyValue;

/// Aggregated metric instruments for media source resolution.
pub struct ResolverMetrics {
    pub resolutions_total: Counter<u64>,
    pub resolution_duration: Histogram<f64>,
    pub catalog_failures_total: Counter<u64>,
    pub preflight_probes_total: Counter<u64>,
    pub soft_fallbacks_total: Counter<u64>,
    pub empty_results_total: Counter<u64>,
}

impl ResolverMetrics {
    fn new() -> Self {
        let meter: Meter = global::meter("ytbridge-resolver");
        Self {
            resolutions_total: meter
                .u64_counter("media_resolutions_total")
                .with_description("Total media source resolutions")
                .build(),
            resolution_duration: meter
                .f64_histogram("media_resolution_duration_seconds")
                .with_description("Wall time of a full resolution including preflight")
                .with_unit("s")
                .build(),
            catalog_failures_total: meter
                .u64_counter("catalog_fetch_failures_total")
                .with_description("Format catalog fetch failures by kind")
                .build(),
            preflight_probes_total: meter
                .u64_counter("preflight_probes_total")
                .with_description("Preflight probes by outcome")
                .build(),
            soft_fallbacks_total: meter
                .u64_counter("preflight_soft_fallbacks_total")
                .with_description("Resolutions that returned an unvalidated list")
                .build(),
            empty_results_total: meter
                .u64_counter("media_resolutions_empty_total")
                .with_description("Resolutions that produced no playable source")
                .build(),
        }
    }
}

static METRICS: OnceLock<ResolverMetrics> = OnceLock::new();

/// Public accessor for global resolver metrics instruments.
pub fn metrics() -> &'static ResolverMetrics {
    METRICS.get_or_init(ResolverMetrics::new)
}
