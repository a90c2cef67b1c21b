// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the kluster operator.
//!
//! All metrics live in one global registry with the namespace prefix
//! `kluster_dev_` and are exposed via the `/metrics` endpoint of the health
//! server.

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all kluster metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "kluster_dev";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of assembly reconciliations by type and outcome
///
/// Labels:
/// - `assembly_type`: "kafka", "connect" or "connect-s2i"
/// - `status`: `success` or `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of assembly reconciliations by type and outcome",
    );
    let counter = CounterVec::new(opts, &["assembly_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of assembly reconciliations in seconds
///
/// Labels:
/// - `assembly_type`: "kafka", "connect" or "connect-s2i"
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of assembly reconciliations in seconds by type",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["assembly_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Number of assemblies seen in the last periodic sweep
///
/// Labels:
/// - `assembly_type`: "kafka", "connect" or "connect-s2i"
pub static ASSEMBLIES_ACTIVE: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_assemblies_active"),
        "Number of assemblies seen in the last periodic sweep by type",
    );
    let gauge = GaugeVec::new(opts, &["assembly_type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Total number of watch streams recreated after an error
///
/// Labels:
/// - `kind`: watched resource kind
pub static WATCH_RESTARTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_watch_restarts_total"),
        "Total number of watch streams recreated after an error",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record the outcome and duration of one assembly reconciliation.
pub fn record_reconciliation(assembly_type: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    RECONCILIATION_TOTAL
        .with_label_values(&[assembly_type, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[assembly_type])
        .observe(duration.as_secs_f64());
}

/// Render all registered metrics in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
