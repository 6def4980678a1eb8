//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Pipeline counters, shared across requests
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    requests_received: AtomicU64,
    requests_completed: AtomicU64,
    requests_short_circuited: AtomicU64,
    requests_failed: AtomicU64,
    requests_cancelled: AtomicU64,
    rewrites_completed: AtomicU64,
    sourcing_calls: AtomicU64,
    inspection_denials: AtomicU64,
    queries_executed: AtomicU64,
    rows_returned: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_short_circuits(&self) {
        self.requests_short_circuited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rewrites(&self) {
        self.rewrites_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add the sourcer invocations of one walk
    pub fn add_sourcing_calls(&self, calls: u64) {
        self.sourcing_calls.fetch_add(calls, Ordering::Relaxed);
    }

    pub fn increment_inspection_denials(&self) {
        self.inspection_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: u64) {
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_short_circuited: self.requests_short_circuited.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            rewrites_completed: self.rewrites_completed.load(Ordering::Relaxed),
            sourcing_calls: self.sourcing_calls.load(Ordering::Relaxed),
            inspection_denials: self.inspection_denials.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub requests_completed: u64,
    pub requests_short_circuited: u64,
    pub requests_failed: u64,
    pub requests_cancelled: u64,
    pub rewrites_completed: u64,
    pub sourcing_calls: u64,
    pub inspection_denials: u64,
    pub queries_executed: u64,
    pub rows_returned: u64,
}
