//! Strategy metrics collection

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe metrics collector for strategies
#[derive(Debug)]
pub struct MetricsCollector {
    start_time: Instant,
    ticks_processed: AtomicU64,
    decisions_approved: AtomicU64,
    decisions_rejected: AtomicU64,
    orders_submitted: AtomicU64,
    errors: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks_processed: AtomicU64::new(0),
            decisions_approved: AtomicU64::new(0),
            decisions_rejected: AtomicU64::new(0),
            orders_submitted: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn increment_ticks(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approved(&self) {
        self.decisions_approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.decisions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_orders(&self) {
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> super::StrategyMetrics {
        super::StrategyMetrics {
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            decisions_approved: self.decisions_approved.load(Ordering::Relaxed),
            decisions_rejected: self.decisions_rejected.load(Ordering::Relaxed),
            orders_submitted: self.orders_submitted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
