// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {
    Count,
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_histogram, histogram};

use std::time::Duration;

/// Initializes the descriptions for all the metrics in the SDK.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_histogram!(
        "multicall_batch_size",
        "Number of unique calls sent in one tryBlockAndAggregate request."
    );
    describe_histogram!(
        "multicall_latency_ms",
        "Round-trip latency of one aggregated eth_call in milliseconds."
    );
    describe_counter!(
        "multicall_failures_total",
        Unit::Count,
        "Aggregated requests that failed, labeled by reason (transport, timeout, call_failed)."
    );
    describe_counter!(
        "tracker_fetch_total",
        Unit::Count,
        "Pool state fetches, labeled by pool type and outcome."
    );
    describe_histogram!(
        "tracker_fetch_latency_ms",
        "Latency of a full tracker fetch in milliseconds, labeled by pool type."
    );
    describe_counter!(
        "rfq_requests_total",
        Unit::Count,
        "Firm quote requests sent to market makers, labeled by outcome."
    );
}

pub fn record_multicall_batch_size(size: usize) {
    histogram!("multicall_batch_size", size as f64);
}

pub fn record_multicall_latency(duration: Duration) {
    histogram!("multicall_latency_ms", duration.as_secs_f64() * 1000.0);
}

pub fn increment_multicall_failures(reason: &'static str) {
    counter!("multicall_failures_total", 1, "reason" => reason);
}

pub fn record_tracker_fetch(pool_type: &str, outcome: &'static str, duration: Duration) {
    counter!("tracker_fetch_total", 1, "pool_type" => pool_type.to_string(), "outcome" => outcome);
    histogram!(
        "tracker_fetch_latency_ms",
        duration.as_secs_f64() * 1000.0,
        "pool_type" => pool_type.to_string()
    );
}

pub fn increment_rfq_requests(outcome: &'static str) {
    counter!("rfq_requests_total", 1, "outcome" => outcome);
}
