// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Technitium webhook.
//!
//! All metrics share the `technitium_webhook_` prefix and are served from the
//! webhook's `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Challenge Metrics** - Present/CleanUp outcomes, latency and in-flight count
//! - **DNS API Metrics** - Zone lookups and record add/delete calls
//! - **Error Metrics** - Failures by status reason
//!
//! # Example
//!
//! ```rust,no_run
//! use technitium_webhook::metrics::record_challenge_success;
//!
//! record_challenge_success("Present", std::time::Duration::from_millis(350));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all webhook metrics
const METRICS_NAMESPACE: &str = "technitium_webhook";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Challenge Metrics
// ============================================================================

/// Total number of challenge operations by action and status
///
/// Labels:
/// - `action`: `Present` or `CleanUp`
/// - `status`: `success` or `error`
pub static CHALLENGE_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_challenge_operations_total"),
        "Total number of challenge operations by action and status",
    );
    let counter = CounterVec::new(opts, &["action", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of challenge operations in seconds, zone discovery included
pub static CHALLENGE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_challenge_duration_seconds"),
        "Duration of challenge operations in seconds by action",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Challenge operations currently in flight
pub static CHALLENGES_IN_FLIGHT: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_challenges_in_flight"),
        "Number of challenge operations currently being processed",
    );
    let gauge = GaugeVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// DNS API Metrics
// ============================================================================

/// Zone discovery lookups by outcome
///
/// Labels:
/// - `outcome`: `hit`, `miss`, `disabled` or `error`
pub static ZONE_LOOKUPS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_zone_lookups_total"),
        "Total number of candidate zone lookups by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record add/delete calls against the Technitium API
///
/// Labels:
/// - `operation`: `add` or `delete`
/// - `status`: `success`, `already_exists`, `already_absent` or `error`
pub static DNS_API_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_api_calls_total"),
        "Total number of Technitium record API calls by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Failed challenge operations by status reason
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of failed challenge operations by action and reason",
    );
    let counter = CounterVec::new(opts, &["action", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Decrements the in-flight gauge for its action when dropped.
///
/// Held for the whole challenge so an operation that is abandoned mid-flight
/// still leaves the gauge balanced.
#[derive(Debug)]
#[must_use = "the in-flight gauge is decremented when the guard is dropped"]
pub struct InFlightGuard {
    action: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        CHALLENGES_IN_FLIGHT
            .with_label_values(&[self.action.as_str()])
            .dec();
    }
}

/// Mark a challenge operation as started.
///
/// The returned guard must live until the operation is finished.
pub fn record_challenge_started(action: &str) -> InFlightGuard {
    CHALLENGES_IN_FLIGHT.with_label_values(&[action]).inc();
    InFlightGuard {
        action: action.to_string(),
    }
}

/// Record a successful challenge operation
///
/// # Arguments
/// * `action` - `Present` or `CleanUp`
/// * `duration` - Time taken, zone discovery included
pub fn record_challenge_success(action: &str, duration: Duration) {
    CHALLENGE_OPERATIONS_TOTAL
        .with_label_values(&[action, "success"])
        .inc();
    finish_challenge(action, duration);
}

/// Record a failed challenge operation
///
/// # Arguments
/// * `action` - `Present` or `CleanUp`
/// * `reason` - Status reason reported back to cert-manager
/// * `duration` - Time taken before the failure
pub fn record_challenge_error(action: &str, reason: &str, duration: Duration) {
    CHALLENGE_OPERATIONS_TOTAL
        .with_label_values(&[action, "error"])
        .inc();
    ERRORS_TOTAL.with_label_values(&[action, reason]).inc();
    finish_challenge(action, duration);
}

fn finish_challenge(action: &str, duration: Duration) {
    CHALLENGE_DURATION_SECONDS
        .with_label_values(&[action])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one candidate zone lookup
pub fn record_zone_lookup(outcome: &str) {
    ZONE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a record add/delete call
pub fn record_api_call(operation: &str, status: &str) {
    DNS_API_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
