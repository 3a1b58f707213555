//! Prometheus metrics for the affiliate program backend:
//! - API request metrics (latency, count)
//! - Commission recording metrics (count, amount, batch outcomes)
//! - Withdrawal metrics (requested/completed count and amount)
//! - Ledger inconsistency counter (partial multi-step operations)

#![allow(dead_code)]

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Metric names as constants for consistency
pub mod names {
    // API Metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Commission Metrics
    pub const COMMISSIONS_RECORDED_TOTAL: &str = "commissions_recorded_total";
    pub const COMMISSION_AMOUNT_BRL: &str = "commission_amount_brl";
    pub const COMMISSION_BATCH_RUNS_TOTAL: &str = "commission_batch_runs_total";
    pub const COMMISSION_BATCH_FAILURES_TOTAL: &str = "commission_batch_failures_total";

    // Withdrawal Metrics
    pub const WITHDRAWALS_REQUESTED_TOTAL: &str = "withdrawals_requested_total";
    pub const WITHDRAWALS_COMPLETED_TOTAL: &str = "withdrawals_completed_total";
    pub const WITHDRAWAL_AMOUNT_BRL: &str = "withdrawal_amount_brl";

    // Ledger Metrics
    pub const LEDGER_INCONSISTENCIES_TOTAL: &str = "ledger_inconsistencies_total";
}

/// Label keys
pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const MODE: &str = "mode";
    pub const OPERATION: &str = "operation";
}

/// Initialize Prometheus metrics exporter
///
/// Returns a handle that can be used to render metrics
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        // HTTP request duration buckets (in seconds)
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .expect("histogram buckets must not be empty");

    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str.clone()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str
    )
    .record(duration_secs);
}

// ============================================================================
// Commission Metrics
// ============================================================================

/// Record a commission credited to an affiliate. `mode` is "batch" or "single".
pub fn record_commission(mode: &str, amount_brl: f64) {
    counter!(
        names::COMMISSIONS_RECORDED_TOTAL,
        labels::MODE => mode.to_string()
    )
    .increment(1);

    counter!(names::COMMISSION_AMOUNT_BRL).increment(amount_brl as u64);
}

/// Record the outcome of one batch run
pub fn record_commission_batch(failed: u64) {
    counter!(names::COMMISSION_BATCH_RUNS_TOTAL).increment(1);
    counter!(names::COMMISSION_BATCH_FAILURES_TOTAL).increment(failed);
}

// ============================================================================
// Withdrawal Metrics
// ============================================================================

/// Record a withdrawal request accepted (pending reservation created)
pub fn record_withdrawal_requested(amount_brl: f64) {
    counter!(names::WITHDRAWALS_REQUESTED_TOTAL).increment(1);
    counter!(names::WITHDRAWAL_AMOUNT_BRL).increment(amount_brl as u64);
}

/// Record a withdrawal confirmed as paid out
pub fn record_withdrawal_completed() {
    counter!(names::WITHDRAWALS_COMPLETED_TOTAL).increment(1);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Record a partial multi-step operation (transaction persisted, balance
/// update failed). These require manual reconciliation.
pub fn record_ledger_inconsistency(operation: &str) {
    counter!(
        names::LEDGER_INCONSISTENCIES_TOTAL,
        labels::OPERATION => operation.to_string()
    )
    .increment(1);
}

// ============================================================================
// Timer Helper
// ============================================================================

/// Timer for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.elapsed_secs();
        assert!(elapsed >= 0.01);
        assert!(elapsed < 0.1);
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(names::HTTP_REQUESTS_TOTAL, "http_requests_total");
        assert_eq!(names::COMMISSIONS_RECORDED_TOTAL, "commissions_recorded_total");
        assert_eq!(names::LEDGER_INCONSISTENCIES_TOTAL, "ledger_inconsistencies_total");
    }
}
