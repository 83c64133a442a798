//! Operator metrics served on `/metrics`.
//!
//! All counters are backed by atomics for lock-free concurrent access.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated metrics for the oracle operator.
///
/// Thread-safe via atomics; shared via `Arc<Metrics>`.
#[derive(Default)]
pub struct Metrics {
    /// Requests handed to the fulfiller, from either listener path.
    pub requests_received: AtomicU64,
    /// Requests successfully fulfilled on-chain.
    pub requests_fulfilled: AtomicU64,
    /// Fulfillment attempts that failed with a retryable cause.
    pub requests_failed: AtomicU64,
    /// Requests dropped because the program rejected them terminally
    /// (already fulfilled, not found, unauthorized, bad proof).
    pub requests_skipped: AtomicU64,
    /// Sum of fulfillment latencies in milliseconds (for computing average).
    pub fulfillment_latency_sum_ms: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub requests_fulfilled: u64,
    pub requests_failed: u64,
    pub requests_skipped: u64,
    pub avg_fulfillment_latency_ms: u64,
    pub total_fulfillment_latency_ms: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful fulfillment with its latency.
    pub fn record_fulfillment(&self, latency_ms: u64) {
        self.requests_fulfilled.fetch_add(1, Ordering::Relaxed);
        self.fulfillment_latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.requests_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Compute average fulfillment latency in milliseconds, or 0 if none.
    pub fn avg_latency_ms(&self) -> u64 {
        let count = self.requests_fulfilled.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.fulfillment_latency_sum_ms.load(Ordering::Relaxed) / count
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_fulfilled: self.requests_fulfilled.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_skipped: self.requests_skipped.load(Ordering::Relaxed),
            avg_fulfillment_latency_ms: self.avg_latency_ms(),
            total_fulfillment_latency_ms: self.fulfillment_latency_sum_ms.load(Ordering::Relaxed),
        }
    }
}
